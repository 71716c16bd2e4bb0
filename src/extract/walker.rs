//! Document-order traversal producing markdown-like fragments
//!
//! The walker keeps a buffer of inline text (`pending`). Meeting a block-level
//! element flushes that buffer as a fragment before the block is handled, so
//! inline runs never swallow block content. Every element is marked in the
//! [`ExtractionContext`] before its children are visited.

use super::context::ExtractionContext;
use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

/// Elements that never contribute text
const SKIPPED: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "canvas", "iframe", "img", "video",
    "audio", "picture", "source", "track", "object", "embed", "button", "input", "select",
    "option", "textarea", "head", "title", "meta", "link",
];

/// Elements walked transparently as block containers
const CONTAINERS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "figure", "details", "form", "fieldset", "address", "center", "hgroup", "search",
    "dialog", "li", "dt", "dd", "tr", "td", "th", "thead", "tbody", "tfoot",
];

/// Elements rendered as a single paragraph of inline text
const PARAGRAPHS: &[&str] = &["p", "figcaption", "summary", "caption", "legend"];

/// Block elements with dedicated rendering
const STRUCTURAL: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "ul", "ol", "table", "dl",
];

pub(crate) struct Walker<'c> {
    ctx: &'c mut ExtractionContext,
    /// When false, fragments are collected without fingerprint checks
    dedup: bool,
    out: Vec<String>,
    pending: String,
    heading: Option<usize>,
}

impl<'c> Walker<'c> {
    pub(crate) fn new(ctx: &'c mut ExtractionContext) -> Self {
        Self {
            ctx,
            dedup: true,
            out: Vec::new(),
            pending: String::new(),
            heading: None,
        }
    }

    /// A walker whose output is gathered into a larger fragment as-is
    fn collecting(ctx: &'c mut ExtractionContext) -> Self {
        Self {
            dedup: false,
            ..Self::new(ctx)
        }
    }

    /// Walks `root` and returns its fragments in document order
    pub(crate) fn walk(mut self, root: NodeRef<'_, Node>) -> Vec<String> {
        self.visit(root);
        self.finish()
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.out
    }

    fn visit_children(&mut self, node: NodeRef<'_, Node>) {
        for child in node.children() {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(text) => self.pending.push_str(text),
            Node::Document | Node::Fragment => self.visit_children(node),
            Node::Element(_) => {
                let Some(element) = ElementRef::wrap(node) else {
                    return;
                };
                let name = element.value().name();

                if is_skipped(element) {
                    return;
                }
                if name != "br" && name != "hr" && !has_visible_text(element) {
                    return;
                }
                if !self.ctx.mark(node.id()) {
                    tracing::trace!("Skipping already processed <{}>", name);
                    return;
                }

                if is_block(name) {
                    self.flush();
                    self.block(element, name);
                    self.flush();
                } else {
                    self.inline(element, name);
                }
            }
            _ => {}
        }
    }

    fn inline(&mut self, element: ElementRef<'_>, name: &str) {
        if name == "br" {
            self.pending.push('\n');
        } else if is_markup(name) && !has_block_descendant(element) {
            let rendered = self.markup(element);
            self.pending.push_str(&rendered);
        } else {
            self.visit_children(*element);
        }
    }

    fn block(&mut self, element: ElementRef<'_>, name: &str) {
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                self.heading = Some(level);
                self.visit_children(*element);
                self.flush();
                self.heading = None;
            }
            "pre" => {
                let fragment = code_block(element);
                self.emit(fragment);
            }
            "blockquote" => {
                let fragments = self.nested(*element);
                let quoted = fragments
                    .join("\n\n")
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {}", line)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                self.emit(quoted);
            }
            "ul" | "ol" => {
                let list = self.list(element, name == "ol");
                self.emit(list);
            }
            "table" => self.table(element),
            "dl" => {
                let mut lines = Vec::new();
                self.definitions(element, &mut lines);
                self.emit(lines.join("\n"));
            }
            "hr" => {}
            // Paragraphs and containers: inline children accumulate in
            // `pending`, nested blocks flush it on their own
            _ => self.visit_children(*element),
        }
    }

    /// Walks the children of `node` with a deduplicating sub-walker
    fn nested(&mut self, node: NodeRef<'_, Node>) -> Vec<String> {
        let mut sub = Walker::new(&mut *self.ctx);
        sub.visit_children(node);
        sub.finish()
    }

    /// Walks the children of `node` without fingerprint checks
    fn collect(&mut self, node: NodeRef<'_, Node>) -> Vec<String> {
        let mut sub = Walker::collecting(&mut *self.ctx);
        sub.visit_children(node);
        sub.finish()
    }

    fn list(&mut self, element: ElementRef<'_>, ordered: bool) -> String {
        let mut number = element
            .value()
            .attr("start")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(1);
        let mut items: Vec<String> = Vec::new();

        for child in element.children() {
            let Some(child_element) = ElementRef::wrap(child) else {
                continue;
            };
            if is_skipped(child_element) || !has_visible_text(child_element) {
                continue;
            }
            if !self.ctx.mark(child.id()) {
                continue;
            }

            if child_element.value().name() == "li" {
                let fragments = self.nested(child);
                if fragments.is_empty() {
                    continue;
                }
                let marker = if ordered {
                    format!("{}.", number)
                } else {
                    "-".to_string()
                };
                number = number.saturating_add(1);
                items.push(list_item(&marker, &fragments));
            } else {
                // Stray content directly inside the list belongs to the
                // previous item, e.g. a nested <ul> that is a sibling of <li>
                let name = child_element.value().name();
                let fragments = if is_block(name) {
                    let mut sub = Walker::new(&mut *self.ctx);
                    sub.block(child_element, name);
                    sub.finish()
                } else {
                    self.nested(child)
                };
                let continuation = indent(&fragments.join("\n"), "  ");
                match items.last_mut() {
                    Some(last) if !continuation.is_empty() => {
                        last.push('\n');
                        last.push_str(&continuation);
                    }
                    None if !continuation.is_empty() => items.push(fragments.join("\n")),
                    _ => {}
                }
            }
        }

        items.join("\n")
    }

    fn definitions(&mut self, element: ElementRef<'_>, lines: &mut Vec<String>) {
        for child in element.children() {
            let Some(child_element) = ElementRef::wrap(child) else {
                continue;
            };
            if is_skipped(child_element) || !has_visible_text(child_element) {
                continue;
            }
            if !self.ctx.mark(child.id()) {
                continue;
            }

            match child_element.value().name() {
                "dt" => {
                    let term = self.collect(child).join(" ");
                    if !term.is_empty() {
                        lines.push(term);
                    }
                }
                "dd" => {
                    let description = self.collect(child).join("\n");
                    let mut description_lines = description.lines();
                    if let Some(first) = description_lines.next() {
                        lines.push(format!(": {}", first));
                        lines.extend(description_lines.map(|line| format!("  {}", line)));
                    }
                }
                // <div> groups of dt/dd pairs
                _ => self.definitions(child_element, lines),
            }
        }
    }

    fn table(&mut self, element: ElementRef<'_>) {
        let mut deferred: Vec<NodeRef<'_, Node>> = Vec::new();
        let mut rows: Vec<(Vec<String>, bool)> = Vec::new();

        for row in table_rows(element) {
            if !self.ctx.mark(row.id()) {
                continue;
            }
            let mut cells = Vec::new();
            let mut all_headers = true;
            for cell in row.children() {
                let Some(cell_element) = ElementRef::wrap(cell) else {
                    continue;
                };
                let name = cell_element.value().name();
                if name != "td" && name != "th" {
                    continue;
                }
                if !self.ctx.mark(cell.id()) {
                    continue;
                }
                all_headers &= name == "th";
                let mut raw = String::new();
                self.cell_text(cell, &mut raw, &mut deferred);
                cells.push(collapse(&raw).replace('|', "\\|"));
            }
            if cells.iter().any(|c| !c.is_empty()) {
                rows.push((cells, all_headers));
            }
        }

        if let Some(caption) = element
            .children()
            .filter_map(ElementRef::wrap)
            .find(|c| c.value().name() == "caption")
        {
            self.visit(*caption);
            self.flush();
        }

        let mut lines = Vec::new();
        for (index, (cells, header)) in rows.iter().enumerate() {
            lines.push(format!("| {} |", cells.join(" | ")));
            if index == 0 && *header {
                lines.push(format!("|{}", " --- |".repeat(cells.len())));
            }
        }
        self.emit(lines.join("\n"));

        for node in deferred {
            self.visit(node);
            self.flush();
        }
    }

    /// Gathers a table cell's inline text
    ///
    /// Block-level children are left out of the cell and collected in
    /// `deferred`, to be emitted after the table.
    fn cell_text<'a>(
        &mut self,
        node: NodeRef<'a, Node>,
        out: &mut String,
        deferred: &mut Vec<NodeRef<'a, Node>>,
    ) {
        for child in node.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(_) => {
                    let Some(element) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = element.value().name();
                    if is_skipped(element) {
                        continue;
                    }
                    if is_block(name) {
                        deferred.push(child);
                        continue;
                    }
                    if !self.ctx.mark(child.id()) {
                        continue;
                    }
                    if name == "br" {
                        out.push(' ');
                    } else if is_markup(name) && !has_block_descendant(element) {
                        out.push_str(&self.markup(element));
                    } else {
                        self.cell_text(child, out, deferred);
                    }
                }
                _ => {}
            }
        }
    }

    /// Renders an inline markup element (`code`, `strong`, `em`, ...)
    fn markup(&mut self, element: ElementRef<'_>) -> String {
        let name = element.value().name();
        let inner = if matches!(name, "code" | "kbd" | "samp") {
            for descendant in element.descendants().skip(1) {
                self.ctx.mark(descendant.id());
            }
            collapse(&element.text().collect::<String>())
        } else {
            let mut raw = String::new();
            self.inline_text(*element, &mut raw);
            collapse(&raw)
        };

        if inner.is_empty() {
            return String::new();
        }

        match name {
            "code" | "kbd" | "samp" => format!("`{}`", inner),
            "strong" | "b" => format!("**{}**", inner),
            "em" | "i" => format!("*{}*", inner),
            _ => inner,
        }
    }

    fn inline_text(&mut self, node: NodeRef<'_, Node>, out: &mut String) {
        for child in node.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(_) => {
                    let Some(element) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if is_skipped(element) || !self.ctx.mark(child.id()) {
                        continue;
                    }
                    let name = element.value().name();
                    if name == "br" {
                        out.push(' ');
                    } else if is_markup(name) {
                        out.push_str(&self.markup(element));
                    } else {
                        self.inline_text(child, out);
                    }
                }
                _ => {}
            }
        }
    }

    /// Turns the pending inline run into a fragment
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let raw = std::mem::take(&mut self.pending);
        let lines: Vec<String> = raw
            .split('\n')
            .map(collapse)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            return;
        }

        let fragment = match self.heading {
            Some(level) => format!("{} {}", "#".repeat(level), lines.join(" ")),
            None => lines.join("\n"),
        };
        self.emit(fragment);
    }

    /// Appends a fragment unless an equal one was already offered
    fn emit(&mut self, fragment: String) {
        let trimmed = fragment.trim_matches('\n');
        if trimmed.trim().is_empty() {
            return;
        }
        if self.dedup && !self.ctx.admit(trimmed) {
            tracing::trace!("Dropped duplicate fragment: {}", trimmed);
            return;
        }
        self.out.push(trimmed.to_string());
    }
}

/// Rows of a table, looking through thead/tbody/tfoot but not nested tables
fn table_rows<'a>(table: ElementRef<'a>) -> Vec<NodeRef<'a, Node>> {
    let mut rows = Vec::new();
    for child in table.children() {
        let Some(element) = ElementRef::wrap(child) else {
            continue;
        };
        match element.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter(|row| {
                        ElementRef::wrap(*row).is_some_and(|r| r.value().name() == "tr")
                    }),
            ),
            _ => {}
        }
    }
    rows
}

fn code_block(element: ElementRef<'_>) -> String {
    let language = language_class(element).or_else(|| {
        element
            .children()
            .filter_map(ElementRef::wrap)
            .find(|child| child.value().name() == "code")
            .and_then(language_class)
    });

    let text: String = element.text().collect();
    let body = text.strip_prefix('\n').unwrap_or(&text).trim_end();
    if body.trim().is_empty() {
        return String::new();
    }
    format!("```{}\n{}\n```", language.unwrap_or_default(), body)
}

fn language_class(element: ElementRef<'_>) -> Option<String> {
    element.value().classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

fn list_item(marker: &str, fragments: &[String]) -> String {
    let joined = fragments.join("\n");
    let mut lines = joined.lines();
    let first = lines.next().unwrap_or_default();
    let mut item = format!("{} {}", marker, first);
    for line in lines {
        item.push('\n');
        item.push_str("  ");
        item.push_str(line);
    }
    item
}

fn indent(text: &str, by: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", by, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_block(name: &str) -> bool {
    CONTAINERS.contains(&name)
        || PARAGRAPHS.contains(&name)
        || STRUCTURAL.contains(&name)
        || name == "hr"
}

fn is_markup(name: &str) -> bool {
    matches!(
        name,
        "code" | "kbd" | "samp" | "strong" | "b" | "em" | "i"
    )
}

fn is_skipped(element: ElementRef<'_>) -> bool {
    let value = element.value();
    SKIPPED.contains(&value.name())
        || value.attr("hidden").is_some()
        || value
            .attr("aria-hidden")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn has_visible_text(element: ElementRef<'_>) -> bool {
    element.text().any(|t| !t.trim().is_empty())
}

fn has_block_descendant(element: ElementRef<'_>) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| is_block(e.value().name()))
}
