//! Shape views over `p:spTree` elements.

use crate::xml::Element;
use deck_core::ShapeNode;

const TABLE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";
const CHART_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";

/// What a shape element holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// `p:sp` with a text body.
    Text,
    Table,
    Picture,
    Chart,
    Group,
    /// Connectors, OLE frames, shapes without text.
    Other,
}

/// Whether `el` is one of the shape elements that may appear in a shape tree.
pub fn is_shape_element(el: &Element) -> bool {
    matches!(
        el.local_name(),
        "sp" | "pic" | "graphicFrame" | "grpSp" | "cxnSp" | "contentPart"
    )
}

impl ShapeNode for Element {
    fn child_shapes(&self) -> Option<Vec<&Self>> {
        if self.is("grpSp") {
            Some(self.elements().filter(|e| is_shape_element(e)).collect())
        } else {
            None
        }
    }
}

/// Shapes directly under a shape tree or group, in document order.
pub fn top_level_shapes(tree: &Element) -> Vec<&Element> {
    tree.elements().filter(|e| is_shape_element(e)).collect()
}

/// Resolve a walker index path to a mutable shape.
pub fn shape_at_path_mut<'a>(tree: &'a mut Element, path: &[usize]) -> Option<&'a mut Element> {
    let mut current = tree;
    for &idx in path {
        current = current
            .elements_mut()
            .filter(|e| is_shape_element(e))
            .nth(idx)?;
    }
    Some(current)
}

fn graphic_data(shape: &Element) -> Option<&Element> {
    shape.path(&["graphic", "graphicData"])
}

pub fn kind(shape: &Element) -> ShapeKind {
    match shape.local_name() {
        "grpSp" => ShapeKind::Group,
        "pic" => ShapeKind::Picture,
        "sp" if shape.child("txBody").is_some() => ShapeKind::Text,
        "graphicFrame" => match graphic_data(shape).and_then(|g| g.attr("uri")) {
            Some(TABLE_URI) => ShapeKind::Table,
            Some(CHART_URI) => ShapeKind::Chart,
            _ => ShapeKind::Other,
        },
        _ => ShapeKind::Other,
    }
}

/// The non-visual properties element (`p:nvSpPr`, `p:nvPicPr`, ...).
fn non_visual(shape: &Element) -> Option<&Element> {
    shape.elements().find(|e| e.local_name().starts_with("nv"))
}

fn c_nv_pr(shape: &Element) -> Option<&Element> {
    non_visual(shape)?.child("cNvPr")
}

/// `cNvPr/@id`, the identifier that survives independent loads.
pub fn shape_id(shape: &Element) -> Option<&str> {
    c_nv_pr(shape)?.attr("id")
}

pub fn shape_name(shape: &Element) -> Option<&str> {
    c_nv_pr(shape)?.attr("name")
}

/// Placeholder type; a `p:ph` without a type is an object placeholder.
pub fn placeholder_type(shape: &Element) -> Option<&str> {
    let ph = non_visual(shape)?.path(&["nvPr", "ph"])?;
    Some(ph.attr("type").unwrap_or("obj"))
}

pub fn is_title_placeholder(shape: &Element) -> bool {
    matches!(placeholder_type(shape), Some("title") | Some("ctrTitle"))
}

/// Text boxes are marked with `cNvSpPr/@txBox="1"`.
pub fn is_text_box(shape: &Element) -> bool {
    non_visual(shape)
        .and_then(|nv| nv.child("cNvSpPr"))
        .and_then(|c| c.attr("txBox"))
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

pub fn text_body(shape: &Element) -> Option<&Element> {
    shape.child("txBody")
}

pub fn text_body_mut(shape: &mut Element) -> Option<&mut Element> {
    shape.child_mut("txBody")
}

/// `a:tbl` of a table graphic frame.
pub fn table(shape: &Element) -> Option<&Element> {
    graphic_data(shape)?.child("tbl")
}

pub fn table_mut(shape: &mut Element) -> Option<&mut Element> {
    shape.path_mut(&["graphic", "graphicData", "tbl"])
}

/// Relationship id of the chart part referenced by a chart frame.
pub fn chart_rel_id(shape: &Element) -> Option<&str> {
    graphic_data(shape)?.child("chart")?.prefixed_attr("id")
}

/// The body placeholder's text of a notes slide tree.
pub fn notes_body(tree: &Element) -> Option<&Element> {
    top_level_shapes(tree)
        .into_iter()
        .find(|s| placeholder_type(s) == Some("body"))
        .and_then(text_body)
}

pub fn notes_body_mut(tree: &mut Element) -> Option<&mut Element> {
    tree.elements_mut()
        .filter(|e| is_shape_element(e))
        .find(|s| placeholder_type(s) == Some("body"))
        .and_then(text_body_mut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{chart_frame, group, picture, slide_tree, table_shape, text_box, text_shape, title_shape};
    use deck_core::walk;

    #[test]
    fn test_kinds_and_ids() {
        let tree = slide_tree(&[
            title_shape("2", "Q3 Results"),
            text_box("3", "Notes box"),
            table_shape("4", &[&["a", "b"]]),
            picture("5", "Logo", "rId2"),
        ]);
        let shapes = top_level_shapes(&tree);
        let kinds: Vec<ShapeKind> = shapes.iter().map(|s| kind(s)).collect();
        assert_eq!(
            kinds,
            [ShapeKind::Text, ShapeKind::Text, ShapeKind::Table, ShapeKind::Picture]
        );
        assert_eq!(shape_id(shapes[2]), Some("4"));
        assert_eq!(shape_name(shapes[3]), Some("Logo"));
        assert!(is_title_placeholder(shapes[0]));
        assert!(!is_title_placeholder(shapes[1]));
        assert!(is_text_box(shapes[1]));
        assert!(table(shapes[2]).is_some());
    }

    #[test]
    fn test_chart_rel_id_with_other_prefix() {
        let frame = chart_frame("8", "rId3").replace("r:id=", "rel:id=").replace(
            "<c:chart ",
            r#"<c:chart xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
        );
        let tree = slide_tree(&[frame]);
        let shapes = top_level_shapes(&tree);
        assert_eq!(kind(shapes[0]), ShapeKind::Chart);
        assert_eq!(chart_rel_id(shapes[0]), Some("rId3"));
    }

    #[test]
    fn test_walk_paths_resolve_mutably() {
        let mut tree = slide_tree(&[
            text_shape("2", "a", &[("top", 0)]),
            group("10", &[text_shape("11", "b", &[("inner", 0)]), group("12", &[text_box("13", "deep")])]),
        ]);
        let walked: Vec<(String, Vec<usize>)> = walk(top_level_shapes(&tree))
            .unwrap()
            .into_iter()
            .map(|w| (shape_id(w.shape).unwrap_or_default().to_string(), w.path))
            .collect();
        assert_eq!(
            walked,
            vec![
                ("2".to_string(), vec![0]),
                ("11".to_string(), vec![1, 0]),
                ("13".to_string(), vec![1, 1, 0]),
            ]
        );

        let deep = shape_at_path_mut(&mut tree, &[1, 1, 0]).unwrap();
        assert_eq!(shape_id(deep), Some("13"));
        assert!(shape_at_path_mut(&mut tree, &[5]).is_none());
    }
}
