//! Renders the HCL2 AST to text.
//!
//! The output is deterministic: the same [`ConfigFile`] value always
//! produces byte-identical text. Two-space indentation, collections always
//! multi-line, escaping applied to string literals at render time.

use super::{BlockLabel, BodyItem, ConfigFile, Expr, Identifier, ObjectElem, ObjectKey};

const INDENT: &str = "  ";

/// Render a configuration file to HCL2 text.
pub fn generate(input: &ConfigFile) -> String {
    let mut w = Writer::new();
    render_body(&mut w, input);
    w.finish()
}

/// Render an expression wrapped in a `${...}` template interpolation.
pub fn interpolate(expr: &Expr) -> String {
    let mut w = Writer::new();
    render_expression(&mut w, expr);
    format!("${{{}}}", w.finish())
}

/// Escape a decoded string for a quoted HCL2 literal.
///
/// Exactly backslash, newline, carriage return, tab and double quote are
/// escaped; non-ASCII code points pass through untouched.
pub fn escape_string(val: &str) -> String {
    let mut out = String::with_capacity(val.len());
    for c in val.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Line-oriented output buffer tracking the current indentation level.
struct Writer {
    out: String,
    level: usize,
    at_line_start: bool,
}

impl Writer {
    fn new() -> Self {
        Self {
            out: String::new(),
            level: 0,
            at_line_start: true,
        }
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.level {
                self.out.push_str(INDENT);
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    /// Write text that may span lines, indenting each new line.
    fn write_multiline(&mut self, text: &str) {
        let mut first = true;
        for line in text.split('\n') {
            if !first {
                self.newline();
            }
            self.write(line);
            first = false;
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    fn newline_if_last_not(&mut self) {
        if !self.at_line_start {
            self.newline();
        }
    }

    /// Ensure the buffer ends with a blank line, unless it is still empty.
    fn blank_line_if_last_not(&mut self) {
        if self.out.is_empty() {
            return;
        }
        self.newline_if_last_not();
        if !self.out.ends_with("\n\n") {
            self.newline();
        }
    }

    fn indented<F: FnOnce(&mut Writer)>(&mut self, f: F) {
        self.newline_if_last_not();
        self.level += 1;
        f(self);
        self.newline_if_last_not();
        self.level -= 1;
    }

    fn finish(self) -> String {
        self.out
    }
}

fn render_body(w: &mut Writer, items: &[BodyItem]) {
    for item in items {
        match item {
            BodyItem::Attribute(name, value) => {
                w.write(name.as_str());
                w.write(" = ");
                render_expression(w, value);
                w.newline_if_last_not();
            }
            BodyItem::Block {
                ident,
                labels,
                body,
            } => {
                w.write(ident.as_str());
                w.write(" ");
                for label in labels {
                    render_label(w, label);
                    w.write(" ");
                }
                w.write("{");
                w.indented(|w| render_body(w, body));
                w.write("}");
                w.newline_if_last_not();
            }
            BodyItem::InlineComment(text) => {
                w.write("// ");
                w.write(text);
                w.newline_if_last_not();
            }
            BodyItem::BlockComment { text, indent } => {
                w.write("/*");
                if *indent {
                    w.level += 1;
                    w.write_multiline(text);
                    w.level -= 1;
                } else {
                    w.write_multiline(text);
                }
                w.write("*/");
                w.newline_if_last_not();
            }
            BodyItem::BlankLine => {
                w.blank_line_if_last_not();
            }
        }
    }
}

fn render_label(w: &mut Writer, label: &BlockLabel) {
    match label {
        BlockLabel::Str(s) => render_string_lit(w, s),
        BlockLabel::Ident(ident) => w.write(ident.as_str()),
    }
}

fn render_string_lit(w: &mut Writer, value: &str) {
    let escaped = escape_string(value);
    w.write("\"");
    w.write(&escaped);
    w.write("\"");
}

fn render_numeric_lit(w: &mut Writer, value: f64) {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        w.write(&format!("{}", value as i64));
    } else {
        w.write(&format!("{}", value));
    }
}

fn render_expression(w: &mut Writer, expression: &Expr) {
    match expression {
        Expr::BooleanLit(b) => w.write(if *b { "true" } else { "false" }),
        Expr::NullLit => w.write("null"),
        Expr::NumericLit(n) => render_numeric_lit(w, *n),
        Expr::StringLit(s) => render_string_lit(w, s),
        Expr::Tuple(values) => {
            w.write("[");
            w.indented(|w| {
                let mut first = true;
                for expr in values {
                    if !first {
                        w.write(",");
                        w.newline();
                    }
                    render_expression(w, expr);
                    first = false;
                }
            });
            w.write("]");
        }
        Expr::Object(elements) => {
            w.write("{");
            w.indented(|w| {
                let mut first = true;
                for elem in elements {
                    if !first {
                        w.write(",");
                        w.newline();
                    }
                    render_object_elem(w, elem);
                    first = false;
                }
            });
            w.write("}");
        }
        Expr::Variable(ident) => w.write(ident.as_str()),
        Expr::Index { expr, index } => {
            render_expression(w, expr);
            w.write("[");
            render_expression(w, index);
            w.write("]");
        }
        Expr::GetAttr { expr, attr } => {
            render_expression(w, expr);
            w.write(".");
            w.write(attr.as_str());
        }
        Expr::FunctionCall { name, args } => {
            w.write(name.as_str());
            w.write("(");
            let mut sep = "";
            for arg in args {
                w.write(sep);
                render_expression(w, arg);
                sep = ", ";
            }
            w.write(")");
        }
        Expr::QuotedTemplate(body) => {
            w.write("\"");
            w.write(body);
            w.write("\"");
        }
        Expr::Heredoc {
            delimiter,
            body,
            indented,
        } => {
            w.write(if *indented { "<<-" } else { "<<" });
            w.write(delimiter.as_str());
            w.newline();
            render_heredoc_body(w, body);
            // The terminator must be a line of its own, never indented.
            w.out.push_str(delimiter.as_str());
            w.newline();
        }
        Expr::Bracketed(expr) => {
            w.write("(");
            render_expression(w, expr);
            w.write(")");
        }
    }
}

fn render_heredoc_body(w: &mut Writer, body: &str) {
    // Heredoc bodies are verbatim: no escaping, no re-indentation. Only a
    // missing trailing newline is added so the terminator gets its own line.
    w.out.push_str(body);
    if !body.ends_with('\n') {
        w.out.push('\n');
    }
    w.at_line_start = true;
}

fn render_object_elem(w: &mut Writer, elem: &ObjectElem) {
    match &elem.key {
        ObjectKey::Ident(ident) => w.write(ident.as_str()),
        ObjectKey::Expr(expr) => render_expression(w, expr),
    }
    w.write(" = ");
    render_expression(w, &elem.value);
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use super::*;

    fn attr(name: &str, value: Expr) -> BodyItem {
        BodyItem::Attribute(Identifier::new(name), value)
    }

    #[test]
    fn renders_attribute() {
        let cf = vec![attr("ami", Expr::StringLit("ami-123".into()))];
        assert_eq!(generate(&cf), "ami = \"ami-123\"\n");
    }

    #[test]
    fn renders_block_with_labels() {
        let cf = vec![block(
            "resource",
            vec!["aws_instance".into(), "web".into()],
            vec![
                attr("ami", Expr::StringLit("ami-123".into())),
                attr("instance_type", Expr::StringLit("t2.micro".into())),
            ],
        )];
        assert_eq!(
            generate(&cf),
            "resource \"aws_instance\" \"web\" {\n  ami = \"ami-123\"\n  instance_type = \"t2.micro\"\n}\n"
        );
    }

    #[test]
    fn renders_nested_blocks() {
        let cf = vec![block(
            "resource",
            vec!["aws_instance".into(), "web".into()],
            vec![block(
                "lifecycle",
                vec![],
                vec![attr("create_before_destroy", Expr::BooleanLit(true))],
            )],
        )];
        assert_eq!(
            generate(&cf),
            "resource \"aws_instance\" \"web\" {\n  lifecycle {\n    create_before_destroy = true\n  }\n}\n"
        );
    }

    #[test]
    fn tuples_render_multiline_without_trailing_comma() {
        let cf = vec![attr(
            "azs",
            tuple(vec![
                Expr::StringLit("us-east-1a".into()),
                Expr::StringLit("us-east-1b".into()),
            ]),
        )];
        assert_eq!(
            generate(&cf),
            "azs = [\n  \"us-east-1a\",\n  \"us-east-1b\"\n]\n"
        );
    }

    #[test]
    fn single_element_tuple_is_still_multiline() {
        let cf = vec![attr("azs", tuple(vec![Expr::StringLit("us-east-1a".into())]))];
        assert_eq!(generate(&cf), "azs = [\n  \"us-east-1a\"\n]\n");
    }

    #[test]
    fn empty_tuple() {
        let cf = vec![attr("azs", tuple(vec![]))];
        assert_eq!(generate(&cf), "azs = [\n]\n");
    }

    #[test]
    fn renders_object_expression() {
        let cf = vec![attr(
            "tags",
            object(vec![("Name", "web"), ("Env", "prod")]),
        )];
        assert_eq!(
            generate(&cf),
            "tags = {\n  Name = \"web\",\n  Env = \"prod\"\n}\n"
        );
    }

    #[test]
    fn renders_traversals_and_calls() {
        let cf = vec![
            attr("subnet_id", variable("aws_subnet").dot("main").dot("id")),
            attr(
                "az",
                variable("aws_subnet")
                    .dot("all")
                    .at(Expr::NumericLit(0.0))
                    .dot("availability_zone"),
            ),
            attr(
                "hash",
                function_call(
                    "base64sha256",
                    vec![function_call(
                        "file",
                        vec![Expr::StringLit("lambda.zip".into())],
                    )],
                ),
            ),
        ];
        assert_eq!(
            generate(&cf),
            "subnet_id = aws_subnet.main.id\naz = aws_subnet.all[0].availability_zone\nhash = base64sha256(file(\"lambda.zip\"))\n"
        );
    }

    #[test]
    fn escaping_table_is_exact() {
        assert_eq!(escape_string("a\\b"), "a\\\\b");
        assert_eq!(escape_string("a\nb"), "a\\nb");
        assert_eq!(escape_string("a\rb"), "a\\rb");
        assert_eq!(escape_string("a\tb"), "a\\tb");
        assert_eq!(escape_string("a\"b"), "a\\\"b");
        // Non-ASCII code points are never escaped.
        assert_eq!(escape_string("héllo ☃"), "héllo ☃");
    }

    #[test]
    fn escaping_round_trips() {
        let original = "a\\b\nc\rd\te\"f";
        let escaped = escape_string(original);
        // Apply the exact inverse mapping.
        let unescaped = escaped
            .replace("\\\\", "\u{0}")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
            .replace("\\\"", "\"")
            .replace('\u{0}', "\\");
        assert_eq!(unescaped, original);
    }

    #[test]
    fn heredoc_adds_missing_trailing_newline() {
        let cf = vec![attr(
            "user_data",
            Expr::Heredoc {
                delimiter: Identifier::new("EOF"),
                body: "#!/bin/sh\necho hi".into(),
                indented: false,
            },
        )];
        assert_eq!(
            generate(&cf),
            "user_data = <<EOF\n#!/bin/sh\necho hi\nEOF\n"
        );
    }

    #[test]
    fn indented_heredoc_uses_dash_marker() {
        let cf = vec![attr(
            "user_data",
            heredoc("EOF", "line\n"),
        )];
        assert_eq!(generate(&cf), "user_data = <<-EOF\nline\nEOF\n");
    }

    #[test]
    fn comments_and_blank_lines() {
        let cf = vec![
            BodyItem::BlankLine, // ignored at start of buffer
            BodyItem::InlineComment("generated file".into()),
            BodyItem::BlankLine,
            attr("ami", Expr::StringLit("ami-123".into())),
        ];
        assert_eq!(generate(&cf), "// generated file\n\nami = \"ami-123\"\n");
    }

    #[test]
    fn rendering_is_deterministic() {
        let cf = vec![block(
            "provider",
            vec!["aws".into()],
            vec![attr("region", Expr::StringLit("ap-southeast-2".into()))],
        )];
        assert_eq!(generate(&cf), generate(&cf));
    }

    #[test]
    fn interpolate_wraps_expression() {
        let e = variable("aws_instance").dot("web").dot("id");
        assert_eq!(interpolate(&e), "${aws_instance.web.id}");
    }

    #[test]
    fn numbers_render_like_json() {
        let cf = vec![
            attr("count", Expr::NumericLit(3.0)),
            attr("weight", Expr::NumericLit(0.5)),
        ];
        assert_eq!(generate(&cf), "count = 3\nweight = 0.5\n");
    }
}
