//! Syntax-tree extraction with oxc.
//!
//! The tree is only read. Call sites are collected by a [`Visit`] pass and
//! the original text is rewritten with [`Splice`], so untouched code keeps
//! its exact formatting.
//!
//! Besides tagged templates, a markup attribute (default `css`) is merged
//! into the element's `class`:
//!
//! ```text
//! <div css={css`color: red;`} />          -> <div class="app-1a2b3c4d" />
//! <div class="card" css="wide" />         -> <div class={"card" + " wide"} />
//! <div class={active()} css="wide" />     -> <div class={(active()) + " wide"} />
//! ```

use std::ops::Range;
use std::sync::Arc;

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Expression, ExpressionStatement, JSXAttribute, JSXAttributeItem, JSXAttributeName,
    JSXAttributeValue, JSXExpression, JSXOpeningElement, TaggedTemplateExpression,
};
use oxc::ast_visit::{Visit, walk};
use oxc::parser::Parser;
use oxc::span::{GetSpan, SourceType, Span};
use rustc_hash::{FxHashMap, FxHashSet};

use super::splice::Splice;
use super::{
    ExtractError, ExtractStrategy, ExtractWarning, Extraction, SourceFile, build_entry, js_string,
    marker,
};
use crate::ident::{ClassNamer, DefaultClassNamer};

/// Tagged-template extraction plus optional attribute merge.
///
/// With no tag it only merges attributes, which is how the pattern strategy
/// and the server transform reuse it.
#[derive(Clone)]
pub struct SyntaxExtractor {
    tag: Option<String>,
    attribute: Option<String>,
    namer: Arc<dyn ClassNamer>,
}

impl SyntaxExtractor {
    pub fn new(tag: &str, attribute: Option<String>) -> Self {
        Self {
            tag: Some(tag.to_string()),
            attribute,
            namer: Arc::new(DefaultClassNamer),
        }
    }

    pub fn attributes_only(attribute: String) -> Self {
        Self {
            tag: None,
            attribute: Some(attribute),
            namer: Arc::new(DefaultClassNamer),
        }
    }

    pub fn with_class_namer(mut self, namer: Arc<dyn ClassNamer>) -> Self {
        self.namer = namer;
        self
    }

    fn may_match(&self, code: &str) -> bool {
        self.tag.as_deref().is_some_and(|t| code.contains(t))
            || self.attribute.as_deref().is_some_and(|a| code.contains(a))
    }
}

impl ExtractStrategy for SyntaxExtractor {
    fn extract(&self, source: &SourceFile<'_>) -> Result<Extraction, ExtractError> {
        let output_extension = marker::output_extension(source.code);
        if !self.may_match(source.code) {
            return Ok(Extraction {
                output_extension,
                ..Extraction::unchanged(source.code)
            });
        }

        let allocator = Allocator::default();
        let source_type = SourceType::from_path(source.id).unwrap_or_else(|_| SourceType::tsx());
        let parsed = Parser::new(&allocator, source.code, source_type).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            let mut message = parsed
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            if message.is_empty() {
                message = "parser aborted".to_string();
            }
            return Err(ExtractError::Parse {
                id: source.id.to_string(),
                message,
            });
        }

        let mut collector = Collector::new(self.tag.as_deref(), self.attribute.as_deref());
        collector.visit_program(&parsed.program);
        Ok(collector.finish(source, self.namer.as_ref(), output_extension))
    }
}

// ============================================================================
// Collection
// ============================================================================

struct TemplateSite {
    span: Span,
    body: Span,
    /// Enclosing statement when the template is the whole statement.
    statement: Option<Span>,
}

enum AttributeValue {
    Literal(String),
    /// Start offset of a matching tagged template.
    Template(u32),
}

enum ClassTarget {
    Missing { insert_at: u32 },
    Literal(Span),
    Expression(Span),
}

struct AttributeSite {
    span: Span,
    value: AttributeValue,
    class: ClassTarget,
}

struct Collector<'c> {
    tag: Option<&'c str>,
    attribute: Option<&'c str>,
    statements: FxHashMap<u32, Span>,
    templates: Vec<TemplateSite>,
    attributes: Vec<AttributeSite>,
    warnings: Vec<ExtractWarning>,
}

impl<'c> Collector<'c> {
    fn new(tag: Option<&'c str>, attribute: Option<&'c str>) -> Self {
        Self {
            tag,
            attribute,
            statements: FxHashMap::default(),
            templates: Vec::new(),
            attributes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn is_style_tag(&self, it: &TaggedTemplateExpression<'_>) -> bool {
        match (&it.tag, self.tag) {
            (Expression::Identifier(ident), Some(tag)) => ident.name.as_str() == tag,
            _ => false,
        }
    }

    fn collect_attribute(&mut self, it: &JSXOpeningElement<'_>, name: &str) {
        let mut class: Option<&JSXAttribute<'_>> = None;
        let mut style: Option<&JSXAttribute<'_>> = None;
        for item in &it.attributes {
            let JSXAttributeItem::Attribute(attr) = item else {
                continue;
            };
            let JSXAttributeName::Identifier(ident) = &attr.name else {
                continue;
            };
            match ident.name.as_str() {
                "class" if class.is_none() => class = Some(&**attr),
                n if n == name && style.is_none() => style = Some(&**attr),
                _ => {}
            }
        }

        let Some(style) = style else { return };
        let Some(value) = &style.value else { return };
        let offset = style.span.start;

        let value = match value {
            JSXAttributeValue::StringLiteral(lit) => AttributeValue::Literal(lit.value.to_string()),
            JSXAttributeValue::ExpressionContainer(container) => match &container.expression {
                JSXExpression::StringLiteral(lit) => AttributeValue::Literal(lit.value.to_string()),
                JSXExpression::TaggedTemplateExpression(t) if self.is_style_tag(t) => {
                    AttributeValue::Template(t.span.start)
                }
                other => return self.unsupported_value(name, expression_kind(other), offset),
            },
            JSXAttributeValue::Element(_) => return self.unsupported_value(name, "element", offset),
            JSXAttributeValue::Fragment(_) => return self.unsupported_value(name, "fragment", offset),
        };

        let class = match class {
            None => ClassTarget::Missing {
                insert_at: it
                    .attributes
                    .last()
                    .map_or(style.span.end, |last| last.span().end),
            },
            Some(attr) => match &attr.value {
                Some(JSXAttributeValue::StringLiteral(lit)) => ClassTarget::Literal(lit.span),
                Some(JSXAttributeValue::ExpressionContainer(container)) => {
                    match &container.expression {
                        JSXExpression::EmptyExpression(_) => {
                            return self.unsupported_class(name, "empty expression", offset);
                        }
                        expr => ClassTarget::Expression(expr.span()),
                    }
                }
                Some(JSXAttributeValue::Element(_)) => {
                    return self.unsupported_class(name, "element", offset);
                }
                Some(JSXAttributeValue::Fragment(_)) => {
                    return self.unsupported_class(name, "fragment", offset);
                }
                None => return self.unsupported_class(name, "missing value", offset),
            },
        };

        self.attributes.push(AttributeSite {
            span: style.span,
            value,
            class,
        });
    }

    fn unsupported_value(&mut self, attribute: &str, kind: &'static str, offset: u32) {
        self.warnings.push(ExtractWarning::UnsupportedAttributeValue {
            attribute: attribute.to_string(),
            kind,
            offset,
        });
    }

    fn unsupported_class(&mut self, attribute: &str, kind: &'static str, offset: u32) {
        self.warnings.push(ExtractWarning::UnsupportedClassValue {
            attribute: attribute.to_string(),
            kind,
            offset,
        });
    }

    fn finish(
        self,
        source: &SourceFile<'_>,
        namer: &dyn ClassNamer,
        output_extension: Option<String>,
    ) -> Extraction {
        let code = source.code;
        let consumed: FxHashSet<u32> = self
            .attributes
            .iter()
            .filter_map(|site| match site.value {
                AttributeValue::Template(start) => Some(start),
                AttributeValue::Literal(_) => None,
            })
            .collect();

        let mut splice = Splice::new(code);
        let mut entries = Vec::with_capacity(self.templates.len());
        // global templates carry no class name
        let mut class_names: FxHashMap<u32, Option<String>> = FxHashMap::default();

        for site in &self.templates {
            let entry = build_entry(namer, source.relative, &code[range(site.body)]);
            if !consumed.contains(&site.span.start) {
                match (entry.is_global, site.statement) {
                    (true, Some(statement)) => splice.remove(range(statement)),
                    (true, None) => splice.replace(range(site.span), "\"\""),
                    (false, _) => splice.replace(range(site.span), js_string(&entry.identifier)),
                }
            }
            class_names.insert(
                site.span.start,
                (!entry.is_global).then(|| entry.identifier.clone()),
            );
            entries.push(entry);
        }

        for site in self.attributes {
            splice.remove(range(site.span));
            let class_name = match site.value {
                AttributeValue::Literal(value) => value,
                AttributeValue::Template(start) => match class_names.get(&start) {
                    Some(Some(name)) => name.clone(),
                    _ => continue,
                },
            };
            match site.class {
                ClassTarget::Missing { insert_at } => {
                    splice.insert(insert_at as usize, class_attribute(&class_name));
                }
                ClassTarget::Literal(span) => {
                    splice.insert(span.start as usize, "{");
                    let suffix = js_string(&format!(" {class_name}"));
                    splice.insert(span.end as usize, format!(" + {suffix}}}"));
                }
                ClassTarget::Expression(span) => {
                    splice.insert(span.start as usize, "(");
                    let suffix = js_string(&format!(" {class_name}"));
                    splice.insert(span.end as usize, format!(") + {suffix}"));
                }
            }
        }

        let rewritten = if splice.is_empty() {
            code.to_string()
        } else {
            splice.apply()
        };

        Extraction {
            rewritten,
            entries,
            output_extension,
            warnings: self.warnings,
        }
    }
}

impl<'a> Visit<'a> for Collector<'_> {
    fn visit_expression_statement(&mut self, it: &ExpressionStatement<'a>) {
        if let Expression::TaggedTemplateExpression(template) = &it.expression
            && self.is_style_tag(template)
        {
            self.statements.insert(template.span.start, it.span);
        }
        walk::walk_expression_statement(self, it);
    }

    fn visit_tagged_template_expression(&mut self, it: &TaggedTemplateExpression<'a>) {
        if !self.is_style_tag(it) {
            walk::walk_tagged_template_expression(self, it);
            return;
        }
        let quasi = it.quasi.span;
        self.templates.push(TemplateSite {
            span: it.span,
            body: Span::new(quasi.start + 1, quasi.end.saturating_sub(1).max(quasi.start + 1)),
            statement: self.statements.get(&it.span.start).copied(),
        });
    }

    fn visit_jsx_opening_element(&mut self, it: &JSXOpeningElement<'a>) {
        if let Some(name) = self.attribute {
            self.collect_attribute(it, name);
        }
        walk::walk_jsx_opening_element(self, it);
    }
}

fn range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

fn expression_kind(expr: &JSXExpression<'_>) -> &'static str {
    match expr {
        JSXExpression::EmptyExpression(_) => "empty expression",
        JSXExpression::Identifier(_) => "identifier",
        JSXExpression::TemplateLiteral(_) => "template literal",
        JSXExpression::TaggedTemplateExpression(_) => "foreign tagged template",
        JSXExpression::StaticMemberExpression(_) | JSXExpression::ComputedMemberExpression(_) => {
            "member expression"
        }
        JSXExpression::CallExpression(_) => "call expression",
        _ => "expression",
    }
}

fn class_attribute(class_name: &str) -> String {
    if class_name.contains('"') {
        format!(" class={{{}}}", js_string(class_name))
    } else {
        format!(" class=\"{class_name}\"")
    }
}
