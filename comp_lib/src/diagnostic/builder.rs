use super::{Code, Diagnostic, Span};

#[derive(Debug, Clone)]
pub struct DiagnosticBuilder {
    span: Span,
    additional_spans: Vec<(Span, Option<String>)>,
}

impl DiagnosticBuilder {
    pub fn new(span: impl Into<Span>) -> Self {
        Self {
            span: span.into(),
            additional_spans: Vec::new(),
        }
    }

    pub fn with_additional_span(mut self, span: impl Into<Span>, message: Option<String>) -> Self {
        self.additional_spans.push((span.into(), message));
        self
    }

    fn build_custom(self, code: Code, message: String) -> Diagnostic {
        Diagnostic {
            code,
            message,
            main_span: (self.span, None),
            additional_spans: self.additional_spans,
        }
    }

    pub fn build_syntax_error(self, unexpected: &str, expected: Vec<&str>) -> Diagnostic {
        let message = if expected.is_empty() {
            format!("unexpected token: {unexpected}")
        } else {
            let expected = expected.join(", ");
            format!("unexpected token: {unexpected}, expected one of: {expected}")
        };
        self.build_custom(Code::SyntaxError, message)
    }

    pub fn build_unknown_instruction(self, name: &str) -> Diagnostic {
        let msg = format!("unknown instruction: {name}");
        self.build_custom(Code::UnknownInstruction, msg)
    }

    pub fn build_invalid_integer(self, literal: &str) -> Diagnostic {
        let msg = format!("integer literal doesn't fit in 64 bits: {literal}");
        self.build_custom(Code::InvalidInteger, msg)
    }

    pub fn build_invalid_type(self, name: &str) -> Diagnostic {
        let msg = format!("unknown type: {name}, expected `i64`, `blob(n)` or a pointer");
        self.build_custom(Code::InvalidType, msg)
    }

    pub fn build_unexpected_annotation(self) -> Diagnostic {
        let msg = "only loads and calls can have a type annotation".to_owned();
        self.build_custom(Code::UnexpectedAnnotation, msg)
    }

    pub fn build_duplicate_function(self, name: &str, first_seen: Span) -> Diagnostic {
        self.with_additional_span(first_seen, Some("first defined here".to_owned()))
            .build_custom(
                Code::DuplicateFunction,
                format!("function `{name}` is defined more than once"),
            )
    }

    pub fn build_duplicate_param(self, name: &str, first_seen: Span) -> Diagnostic {
        self.with_additional_span(first_seen, Some("first declared here".to_owned()))
            .build_custom(
                Code::DuplicateParam,
                format!("parameter `{name}` is declared more than once"),
            )
    }

    pub fn build_empty_function(self, name: &str) -> Diagnostic {
        let msg = format!("function `{name}` has no instructions and returns immediately");
        self.build_custom(Code::EmptyFunction, msg)
    }
}
