use std::{
    io::Write,
    path::{Path, PathBuf},
};

use pulldown_cmark::{Event, Parser, TextMergeStream, html};
use time::OffsetDateTime;

use crate::utils::format_date;

/// Produces the certificate document on disk.
pub trait Renderer: Send + Sync {
    /// Write the certificate for `student_name` and `course_title` to
    /// `output_dir/file_name` and return the full path.
    fn render(
        &self,
        student_name: &str,
        course_title: &str,
        issued_at: OffsetDateTime,
        output_dir: &Path,
        file_name: &str,
    ) -> std::io::Result<PathBuf>;
}

const TEMPLATE: &str = "\
# Certificate of Completion

This is to certify that

## {student}

has successfully completed the course

## {course}

*Date: {date}*
";

const STYLE: &str = "body{font-family:serif;text-align:center;margin:4em}\
h1{font-size:2.4em}h2{text-decoration:underline}em{display:block;text-align:right}";

/// Renders an HTML certificate from a markdown template.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    /// Names replace whole text events after parsing, so markup in a name is
    /// escaped and placeholder-like text in a name is left alone.
    pub fn to_html(student_name: &str, course_title: &str, issued_at: OffsetDateTime) -> String {
        let date = format_date(issued_at);
        let events = TextMergeStream::new(Parser::new(TEMPLATE)).map(|event| match event {
            Event::Text(text) => match text.as_ref() {
                "{student}" => Event::Text(student_name.to_string().into()),
                "{course}" => Event::Text(course_title.to_string().into()),
                // only template text reaches here
                template => Event::Text(template.replace("{date}", &date).into()),
            },
            other => other,
        });
        let mut body = String::new();
        html::push_html(&mut body, events);
        let mut title = String::new();
        html::push_html(
            &mut title,
            std::iter::once(Event::Text(format!("{course_title} certificate").into())),
        );
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
             <style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
        )
    }
}

impl Renderer for HtmlRenderer {
    fn render(
        &self,
        student_name: &str,
        course_title: &str,
        issued_at: OffsetDateTime,
        output_dir: &Path,
        file_name: &str,
    ) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(file_name);
        let html = Self::to_html(student_name, course_title, issued_at);
        // write beside the target then rename, so readers never see a torn file
        let mut file = tempfile::NamedTempFile::new_in(output_dir)?;
        file.write_all(html.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_contains_names_and_date() {
        let at = time::macros::datetime!(2025-01-31 09:00 UTC);
        let html = HtmlRenderer::to_html("Ada Lovelace", "Rust for Rustaceans", at);
        assert!(html.contains("<h2>Ada Lovelace</h2>"));
        assert!(html.contains("<h2>Rust for Rustaceans</h2>"));
        assert!(html.contains("2025-01-31"));
        assert!(html.contains("Certificate of Completion"));
        for placeholder in ["{student}", "{course}", "{date}"] {
            assert!(!html.contains(placeholder), "{placeholder} left unfilled");
        }
    }

    #[test]
    fn test_placeholder_like_names_are_kept_verbatim() {
        let at = time::macros::datetime!(2025-01-31 09:00 UTC);
        let html = HtmlRenderer::to_html("{course}", "Intro {date} {student}", at);
        assert!(html.contains("<h2>{course}</h2>"));
        assert!(html.contains("<h2>Intro {date} {student}</h2>"));
        assert!(html.contains("Date: 2025-01-31"));
    }

    #[test]
    fn test_markup_in_names_is_escaped() {
        let html = HtmlRenderer::to_html("<script>x</script>", "a & b", time::OffsetDateTime::UNIX_EPOCH);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a &amp; b"));
    }

    #[test]
    fn test_render_overwrites_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = HtmlRenderer;
        let at = time::OffsetDateTime::UNIX_EPOCH;
        let first = renderer.render("Ada", "Rust", at, dir.path(), "c.html").unwrap();
        let second = renderer.render("Ada", "Rust 2", at, dir.path(), "c.html").unwrap();
        assert_eq!(first, second);
        let content = std::fs::read_to_string(&second).unwrap();
        assert!(content.contains("Rust 2"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
