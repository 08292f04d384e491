use crossterm::style::{Attribute, Color, ContentStyle};
use pdfmark_core::{BookmarkNode, VisibleRow};

/// Text of one tree panel line, padded or cut to exactly `width` columns.
pub fn format_row(row: &VisibleRow<'_>, batch_mode: bool, width: usize) -> String {
    let node = row.node;
    let glyph = match (node.children.is_empty(), row.collapsed) {
        (true, _) => ' ',
        (false, true) => '▸',
        (false, false) => '▾',
    };
    let check = match (batch_mode, row.selected) {
        (false, _) => "",
        (true, true) => "[x] ",
        (true, false) => "[ ] ",
    };
    let target = if node.dest_x.is_some() || node.dest_y.is_some() {
        "⌖"
    } else {
        ""
    };

    let left = format!("{}{glyph} {check}{}", "  ".repeat(row.level), node.title);
    let right = format!(" {target}p.{}", node.page);
    fit(&left, &right, width)
}

fn fit(left: &str, right: &str, width: usize) -> String {
    let right_len = right.chars().count();
    if right_len >= width {
        return right.chars().take(width).collect();
    }
    let room = width - right_len;
    let left_len = left.chars().count();
    let mut line: String = if left_len > room {
        let mut cut: String = left.chars().take(room.saturating_sub(1)).collect();
        cut.push('…');
        cut
    } else {
        format!("{left}{}", " ".repeat(room - left_len))
    };
    line.push_str(right);
    line
}

/// Terminal style reflecting the bookmark's colour and font style.
pub fn row_style(node: &BookmarkNode, under_cursor: bool) -> ContentStyle {
    let mut style = ContentStyle::new();
    if let Some(color) = node.color {
        let [r, g, b] = color.to_rgb8();
        style.foreground_color = Some(Color::Rgb { r, g, b });
    }
    if let Some(font) = node.style {
        if font.is_bold() {
            style.attributes.set(Attribute::Bold);
        }
        if font.is_italic() {
            style.attributes.set(Attribute::Italic);
        }
    }
    if under_cursor {
        style.attributes.set(Attribute::Reverse);
    }
    style
}

#[cfg(test)]
mod tests {
    use pdfmark_core::{BookmarkColor, BookmarkStyle};

    use super::*;

    fn node(title: &str, page: u32) -> BookmarkNode {
        BookmarkNode::new(title, page)
    }

    #[test]
    fn rows_are_indented_and_padded_to_width() {
        let mut parent = node("Chapter 1", 3);
        parent.children.push(node("Section", 4));
        let row = VisibleRow {
            level: 0,
            node: &parent,
            collapsed: false,
            selected: false,
        };
        let line = format_row(&row, false, 24);
        assert_eq!(line.chars().count(), 24);
        assert!(line.starts_with("▾ Chapter 1"));
        assert!(line.ends_with(" p.3"));

        let child = &parent.children[0];
        let row = VisibleRow {
            level: 1,
            node: child,
            collapsed: false,
            selected: true,
        };
        let line = format_row(&row, true, 30);
        assert!(line.starts_with("    [x] Section"));
    }

    #[test]
    fn long_titles_are_cut_with_an_ellipsis() {
        let long = node("A very long bookmark title indeed", 12);
        let row = VisibleRow {
            level: 0,
            node: &long,
            collapsed: true,
            selected: false,
        };
        let line = format_row(&row, false, 16);
        assert_eq!(line.chars().count(), 16);
        assert!(line.contains('…'));
        assert!(line.ends_with("p.12"));
    }

    #[test]
    fn destinations_are_flagged() {
        let mut marked = node("Figure", 2);
        marked.dest_y = Some(400.0);
        let row = VisibleRow {
            level: 0,
            node: &marked,
            collapsed: false,
            selected: false,
        };
        assert!(format_row(&row, false, 20).ends_with("⌖p.2"));
    }

    #[test]
    fn style_follows_colour_and_font() {
        let mut styled = node("Intro", 1);
        styled.color = Some(BookmarkColor::Blue);
        styled.style = Some(BookmarkStyle::BoldItalic);

        let style = row_style(&styled, true);
        assert_eq!(
            style.foreground_color,
            Some(Color::Rgb { r: 0, g: 0, b: 255 })
        );
        assert!(style.attributes.has(Attribute::Bold));
        assert!(style.attributes.has(Attribute::Italic));
        assert!(style.attributes.has(Attribute::Reverse));

        let plain = row_style(&node("Plain", 1), false);
        assert!(plain.foreground_color.is_none());
        assert!(!plain.attributes.has(Attribute::Bold));
    }
}
