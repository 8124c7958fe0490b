//! Embedded Schematron assertion rules and their evaluator.
//!
//! A rule binds a context path to one or more boolean tests with diagnostic
//! messages. The expression language is a restricted XPath subset sufficient
//! for Schematron assertions: paths, comparisons, boolean connectives and the
//! common string/number functions. Rules fire once per matching element, when
//! that element's subtree is complete, so tests over descendants are
//! decidable even though the verifier is streaming.

use std::fmt;

use crate::diagnostic::Diagnostic;
use crate::event::{Location, QName};

// ---------------------------------------------------------------------------
// Document node arena
// ---------------------------------------------------------------------------

/// Lightweight view of the document built incrementally by the verifier so
/// that assertions have something to evaluate against.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<ElementNode>,
}

#[derive(Debug)]
pub struct ElementNode {
    pub name: QName,
    pub parent: Option<usize>,
    pub attributes: Vec<(QName, String)>,
    pub children: Vec<NodeChild>,
    pub location: Location,
}

#[derive(Debug)]
pub enum NodeChild {
    Element(usize),
    Text(String),
}

/// Reference to a value-bearing node for path results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Element(usize),
    /// (element id, attribute index)
    Attribute(usize, usize),
    /// (element id, child index of the text chunk)
    Text(usize, usize),
}

impl NodeArena {
    pub fn push(&mut self, name: QName, parent: Option<usize>, location: Location) -> usize {
        let id = self.nodes.len();
        self.nodes.push(ElementNode {
            name,
            parent,
            attributes: Vec::new(),
            children: Vec::new(),
            location,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(NodeChild::Element(id));
        }
        id
    }

    pub fn node(&self, id: usize) -> &ElementNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut ElementNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn root_of(&self, mut id: usize) -> usize {
        while let Some(p) = self.nodes[id].parent {
            id = p;
        }
        id
    }

    fn descendants_of(&self, id: usize, out: &mut Vec<usize>) {
        for child in &self.nodes[id].children {
            if let NodeChild::Element(c) = child {
                out.push(*c);
                self.descendants_of(*c, out);
            }
        }
    }

    /// XPath string-value of an element: all descendant text concatenated.
    pub fn element_string_value(&self, id: usize) -> String {
        let mut out = String::new();
        self.append_text(id, &mut out);
        out
    }

    fn append_text(&self, id: usize, out: &mut String) {
        for child in &self.nodes[id].children {
            match child {
                NodeChild::Text(s) => out.push_str(s),
                NodeChild::Element(c) => self.append_text(*c, out),
            }
        }
    }

    pub fn string_value(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Element(id) => self.element_string_value(id),
            NodeRef::Attribute(id, idx) => self.nodes[id].attributes[idx].1.clone(),
            NodeRef::Text(id, idx) => match &self.nodes[id].children[idx] {
                NodeChild::Text(s) => s.clone(),
                NodeChild::Element(_) => String::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Context paths
// ---------------------------------------------------------------------------

/// A name test within a context path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    Any,
    Local(String),
}

impl NameTest {
    fn matches(&self, name: &QName) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Local(local) => *local == name.local,
        }
    }
}

/// Context-selecting path of a rule: a sequence of element name tests over
/// the ancestry, optionally anchored at the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPath {
    anchored: bool,
    segments: Vec<NameTest>,
}

impl ContextPath {
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err("empty context path".to_string());
        }
        let (anchored, rest) = if let Some(r) = trimmed.strip_prefix("//") {
            (false, r)
        } else if let Some(r) = trimmed.strip_prefix('/') {
            (true, r)
        } else {
            (false, trimmed)
        };
        let mut segments = Vec::new();
        for seg in rest.split('/') {
            let seg = seg.trim();
            if seg.is_empty() {
                return Err(format!("malformed context path \"{}\"", input));
            }
            if seg == "*" {
                segments.push(NameTest::Any);
            } else if seg
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
            {
                // A prefixed name matches on its local part.
                let local = seg.rsplit(':').next().unwrap_or(seg);
                segments.push(NameTest::Local(local.to_string()));
            } else {
                return Err(format!("unsupported step \"{}\" in context path", seg));
            }
        }
        Ok(Self { anchored, segments })
    }

    /// Does this path select the given element?
    pub fn matches(&self, arena: &NodeArena, node: usize) -> bool {
        let mut current = Some(node);
        for segment in self.segments.iter().rev() {
            match current {
                Some(id) if segment.matches(&arena.node(id).name) => {
                    current = arena.node(id).parent;
                }
                _ => return false,
            }
        }
        // Anchored paths must have consumed the whole ancestry.
        !self.anchored || current.is_none()
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.anchored {
            write!(f, "/")?;
        }
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                NameTest::Any => "*".to_string(),
                NameTest::Local(l) => l.clone(),
            })
            .collect();
        write!(f, "{}", parts.join("/"))
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Not,
    Count,
    StringLength,
    NormalizeSpace,
    String,
    Number,
    Boolean,
    Contains,
    StartsWith,
    True,
    False,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Child(NameTest),
    Attribute(String),
    Parent,
    SelfNode,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub absolute: bool,
    pub descendant: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(String),
    Number(f64),
    Path(PathExpr),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Func,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn parse(input: &str) -> Result<Expr, String> {
        let tokens = lex(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!("trailing input in expression \"{}\"", input));
        }
        Ok(expr)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Slash,
    DoubleSlash,
    At,
    Dot,
    DotDot,
    Star,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
}

fn lex(input: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            '@' => {
                tokens.push(Tok::At);
                i += 1;
            }
            '*' => {
                tokens.push(Tok::Star);
                i += 1;
            }
            '+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    tokens.push(Tok::DoubleSlash);
                    i += 2;
                } else {
                    tokens.push(Tok::Slash);
                    i += 1;
                }
            }
            '.' => {
                if chars.get(i + 1) == Some(&'.') {
                    tokens.push(Tok::DotDot);
                    i += 2;
                } else {
                    tokens.push(Tok::Dot);
                    i += 1;
                }
            }
            '=' => {
                tokens.push(Tok::Eq);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Ne);
                    i += 2;
                } else {
                    return Err("unexpected '!'".to_string());
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Le);
                    i += 2;
                } else {
                    tokens.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Ge);
                    i += 2;
                } else {
                    tokens.push(Tok::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Tok::Str(s));
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("bad number \"{}\"", text))?;
                tokens.push(Tok::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() {
                    let ch = chars[i];
                    let is_name = ch.is_alphanumeric() || matches!(ch, '_' | '.' | ':');
                    // '-' continues the name only when glued to more name
                    // characters, so "a - 1" still lexes as subtraction.
                    let is_hyphen_in_name = ch == '-'
                        && chars
                            .get(i + 1)
                            .is_some_and(|n| n.is_alphanumeric() || *n == '_');
                    if is_name || is_hyphen_in_name {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Tok::Ident(text));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), String> {
        match self.bump() {
            Some(t) if t == *tok => Ok(()),
            other => Err(format!("expected {:?}, found {:?}", tok, other)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::Ident(id)) if id == "or") {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_comparison()?;
        while matches!(self.peek(), Some(Tok::Ident(id)) if id == "and") {
            self.bump();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Tok::Eq) => BinOp::Eq,
            Some(Tok::Ne) => BinOp::Ne,
            Some(Tok::Lt) => BinOp::Lt,
            Some(Tok::Le) => BinOp::Le,
            Some(Tok::Gt) => BinOp::Gt,
            Some(Tok::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if matches!(self.peek(), Some(Tok::Minus)) {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.peek().cloned() {
            Some(Tok::Number(n)) => {
                self.bump();
                Ok(Expr::Number(n))
            }
            Some(Tok::Str(s)) => {
                self.bump();
                Ok(Expr::Literal(s))
            }
            Some(Tok::LParen) => {
                self.bump();
                let inner = self.parse_or()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Ident(id))
                if self.tokens.get(self.pos + 1) == Some(&Tok::LParen) && id != "text" =>
            {
                self.bump();
                self.bump();
                let func = lookup_function(&id)?;
                let mut args = Vec::new();
                if self.peek() != Some(&Tok::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.peek() == Some(&Tok::Comma) {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Tok::RParen)?;
                check_arity(func, &id, args.len())?;
                Ok(Expr::Call { func, args })
            }
            Some(Tok::Ident(_))
            | Some(Tok::Slash)
            | Some(Tok::DoubleSlash)
            | Some(Tok::At)
            | Some(Tok::Dot)
            | Some(Tok::DotDot)
            | Some(Tok::Star) => self.parse_path(),
            other => Err(format!("unexpected token {:?}", other)),
        }
    }

    fn parse_path(&mut self) -> Result<Expr, String> {
        let mut absolute = false;
        let mut descendant = false;
        match self.peek() {
            Some(Tok::Slash) => {
                absolute = true;
                self.bump();
            }
            Some(Tok::DoubleSlash) => {
                absolute = true;
                descendant = true;
                self.bump();
            }
            _ => {}
        }
        let mut steps = Vec::new();
        loop {
            match self.peek().cloned() {
                Some(Tok::Dot) => {
                    self.bump();
                    steps.push(Step::SelfNode);
                }
                Some(Tok::DotDot) => {
                    self.bump();
                    steps.push(Step::Parent);
                }
                Some(Tok::Star) => {
                    self.bump();
                    steps.push(Step::Child(NameTest::Any));
                }
                Some(Tok::At) => {
                    self.bump();
                    match self.bump() {
                        Some(Tok::Ident(name)) => steps.push(Step::Attribute(name)),
                        other => return Err(format!("expected attribute name, found {:?}", other)),
                    }
                }
                Some(Tok::Ident(id)) => {
                    self.bump();
                    if id == "text" && self.peek() == Some(&Tok::LParen) {
                        self.bump();
                        self.expect(&Tok::RParen)?;
                        steps.push(Step::Text);
                    } else {
                        let local = id.rsplit(':').next().unwrap_or(&id).to_string();
                        steps.push(Step::Child(NameTest::Local(local)));
                    }
                }
                other => return Err(format!("expected a path step, found {:?}", other)),
            }
            if self.peek() == Some(&Tok::Slash) {
                self.bump();
            } else {
                break;
            }
        }
        if steps.is_empty() {
            return Err("empty path".to_string());
        }
        Ok(Expr::Path(PathExpr {
            absolute,
            descendant,
            steps,
        }))
    }
}

fn lookup_function(name: &str) -> Result<Func, String> {
    match name {
        "not" => Ok(Func::Not),
        "count" => Ok(Func::Count),
        "string-length" => Ok(Func::StringLength),
        "normalize-space" => Ok(Func::NormalizeSpace),
        "string" => Ok(Func::String),
        "number" => Ok(Func::Number),
        "boolean" => Ok(Func::Boolean),
        "contains" => Ok(Func::Contains),
        "starts-with" => Ok(Func::StartsWith),
        "true" => Ok(Func::True),
        "false" => Ok(Func::False),
        other => Err(format!("unsupported function \"{}\"", other)),
    }
}

fn check_arity(func: Func, name: &str, argc: usize) -> Result<(), String> {
    let ok = match func {
        Func::True | Func::False => argc == 0,
        Func::Not | Func::Count => argc == 1,
        Func::StringLength | Func::NormalizeSpace | Func::String | Func::Number | Func::Boolean => {
            argc <= 1
        }
        Func::Contains | Func::StartsWith => argc == 2,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("wrong number of arguments for {}()", name))
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// An XPath 1.0 style value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
    Nodes(Vec<NodeRef>),
}

impl Value {
    pub fn boolean(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Nodes(ns) => !ns.is_empty(),
        }
    }

    pub fn number(&self, arena: &NodeArena) -> f64 {
        match self {
            Value::Num(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            Value::Nodes(ns) => match ns.first() {
                Some(n) => arena
                    .string_value(*n)
                    .trim()
                    .parse::<f64>()
                    .unwrap_or(f64::NAN),
                None => f64::NAN,
            },
        }
    }

    pub fn string(&self, arena: &NodeArena) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => format_number(*n),
            Value::Nodes(ns) => ns.first().map(|n| arena.string_value(*n)).unwrap_or_default(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl Expr {
    pub fn eval(&self, arena: &NodeArena, ctx: usize) -> Value {
        match self {
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Neg(inner) => Value::Num(-inner.eval(arena, ctx).number(arena)),
            Expr::Path(path) => Value::Nodes(eval_path(path, arena, ctx)),
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(arena, ctx);
                match op {
                    BinOp::Or => return Value::Bool(l.boolean() || rhs.eval(arena, ctx).boolean()),
                    BinOp::And => {
                        return Value::Bool(l.boolean() && rhs.eval(arena, ctx).boolean());
                    }
                    _ => {}
                }
                let r = rhs.eval(arena, ctx);
                match op {
                    BinOp::Add => Value::Num(l.number(arena) + r.number(arena)),
                    BinOp::Sub => Value::Num(l.number(arena) - r.number(arena)),
                    BinOp::Eq => Value::Bool(compare_eq(&l, &r, arena)),
                    BinOp::Ne => Value::Bool(compare_ne(&l, &r, arena)),
                    BinOp::Lt => Value::Bool(compare_rel(&l, &r, arena, |a, b| a < b)),
                    BinOp::Le => Value::Bool(compare_rel(&l, &r, arena, |a, b| a <= b)),
                    BinOp::Gt => Value::Bool(compare_rel(&l, &r, arena, |a, b| a > b)),
                    BinOp::Ge => Value::Bool(compare_rel(&l, &r, arena, |a, b| a >= b)),
                    BinOp::Or | BinOp::And => unreachable!("handled above"),
                }
            }
            Expr::Call { func, args } => {
                let arg = |i: usize| -> Value {
                    args.get(i)
                        .map(|a| a.eval(arena, ctx))
                        .unwrap_or_else(|| Value::Nodes(vec![NodeRef::Element(ctx)]))
                };
                match func {
                    Func::True => Value::Bool(true),
                    Func::False => Value::Bool(false),
                    Func::Not => Value::Bool(!arg(0).boolean()),
                    Func::Boolean => Value::Bool(arg(0).boolean()),
                    Func::Number => Value::Num(arg(0).number(arena)),
                    Func::String => Value::Str(arg(0).string(arena)),
                    Func::Count => match arg(0) {
                        Value::Nodes(ns) => Value::Num(ns.len() as f64),
                        _ => Value::Num(0.0),
                    },
                    Func::StringLength => {
                        Value::Num(arg(0).string(arena).chars().count() as f64)
                    }
                    Func::NormalizeSpace => {
                        Value::Str(crate::datatype::collapse(&arg(0).string(arena)))
                    }
                    Func::Contains => {
                        Value::Bool(arg(0).string(arena).contains(&arg(1).string(arena)))
                    }
                    Func::StartsWith => {
                        Value::Bool(arg(0).string(arena).starts_with(&arg(1).string(arena)))
                    }
                }
            }
        }
    }
}

fn eval_path(path: &PathExpr, arena: &NodeArena, ctx: usize) -> Vec<NodeRef> {
    if path.absolute && path.descendant {
        // //x reaches every element in the document, the root included.
        let root = arena.root_of(ctx);
        let mut all = vec![root];
        arena.descendants_of(root, &mut all);
        let seeds = all.into_iter().map(NodeRef::Element).collect();
        return apply_steps_descendant(path, arena, seeds);
    }
    if path.absolute {
        // There is no explicit document node in the arena, so an absolute
        // path's first step selects the root itself by name.
        let root = arena.root_of(ctx);
        if let Some(Step::Child(test)) = path.steps.first() {
            let current = if test.matches(&arena.node(root).name) {
                vec![NodeRef::Element(root)]
            } else {
                Vec::new()
            };
            return apply_steps(&path.steps[1..], arena, current);
        }
        return apply_steps(&path.steps, arena, vec![NodeRef::Element(root)]);
    }
    apply_steps(&path.steps, arena, vec![NodeRef::Element(ctx)])
}

fn apply_steps_descendant(path: &PathExpr, arena: &NodeArena, seeds: Vec<NodeRef>) -> Vec<NodeRef> {
    // First step matches each seed element itself; remaining steps walk down.
    let mut matched = Vec::new();
    if let Some(Step::Child(test)) = path.steps.first() {
        for node in seeds {
            if let NodeRef::Element(id) = node {
                if test.matches(&arena.node(id).name) {
                    matched.push(NodeRef::Element(id));
                }
            }
        }
        apply_steps(&path.steps[1..], arena, matched)
    } else {
        apply_steps(&path.steps, arena, seeds)
    }
}

fn apply_steps(steps: &[Step], arena: &NodeArena, mut current: Vec<NodeRef>) -> Vec<NodeRef> {
    for step in steps {
        let mut next = Vec::new();
        for node in &current {
            let id = match node {
                NodeRef::Element(id) => *id,
                // Attribute and text nodes have no children to step into.
                _ => continue,
            };
            match step {
                Step::SelfNode => next.push(NodeRef::Element(id)),
                Step::Parent => {
                    if let Some(p) = arena.node(id).parent {
                        next.push(NodeRef::Element(p));
                    }
                }
                Step::Child(test) => {
                    for child in &arena.node(id).children {
                        if let NodeChild::Element(c) = child {
                            if test.matches(&arena.node(*c).name) {
                                next.push(NodeRef::Element(*c));
                            }
                        }
                    }
                }
                Step::Attribute(name) => {
                    for (idx, (attr_name, _)) in arena.node(id).attributes.iter().enumerate() {
                        if attr_name.local == *name {
                            next.push(NodeRef::Attribute(id, idx));
                        }
                    }
                }
                Step::Text => {
                    for (idx, child) in arena.node(id).children.iter().enumerate() {
                        if matches!(child, NodeChild::Text(_)) {
                            next.push(NodeRef::Text(id, idx));
                        }
                    }
                }
            }
        }
        next.dedup();
        current = next;
    }
    current
}

fn compare_eq(l: &Value, r: &Value, arena: &NodeArena) -> bool {
    match (l, r) {
        (Value::Nodes(ns), Value::Nodes(ms)) => {
            // node-set vs node-set: existential over string-values
            ns.iter().any(|n| {
                let sv = arena.string_value(*n);
                ms.iter().any(|m| arena.string_value(*m) == sv)
            })
        }
        (Value::Nodes(ns), Value::Bool(b)) | (Value::Bool(b), Value::Nodes(ns)) => {
            !ns.is_empty() == *b
        }
        (Value::Nodes(ns), other) | (other, Value::Nodes(ns)) => ns.iter().any(|n| {
            let sv = arena.string_value(*n);
            match other {
                Value::Num(x) => sv.trim().parse::<f64>().map(|v| v == *x).unwrap_or(false),
                _ => sv == other.string(arena),
            }
        }),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => l.boolean() == r.boolean(),
        (Value::Num(_), _) | (_, Value::Num(_)) => l.number(arena) == r.number(arena),
        _ => l.string(arena) == r.string(arena),
    }
}

fn compare_ne(l: &Value, r: &Value, arena: &NodeArena) -> bool {
    match (l, r) {
        (Value::Nodes(ns), Value::Bool(b)) | (Value::Bool(b), Value::Nodes(ns)) => {
            !ns.is_empty() != *b
        }
        (Value::Nodes(ns), other) | (other, Value::Nodes(ns))
            if !matches!(other, Value::Nodes(_)) =>
        {
            ns.iter().any(|n| {
                let sv = arena.string_value(*n);
                match other {
                    Value::Num(x) => sv.trim().parse::<f64>().map(|v| v != *x).unwrap_or(true),
                    _ => sv != other.string(arena),
                }
            })
        }
        _ => !compare_eq(l, r, arena),
    }
}

fn compare_rel(l: &Value, r: &Value, arena: &NodeArena, cmp: fn(f64, f64) -> bool) -> bool {
    match (l, r) {
        (Value::Nodes(ns), other) if !matches!(other, Value::Nodes(_)) => ns.iter().any(|n| {
            let sv = arena.string_value(*n);
            let v = sv.trim().parse::<f64>().unwrap_or(f64::NAN);
            cmp(v, other.number(arena))
        }),
        (other, Value::Nodes(ns)) if !matches!(other, Value::Nodes(_)) => ns.iter().any(|n| {
            let sv = arena.string_value(*n);
            let v = sv.trim().parse::<f64>().unwrap_or(f64::NAN);
            cmp(other.number(arena), v)
        }),
        _ => cmp(l.number(arena), r.number(arena)),
    }
}

// ---------------------------------------------------------------------------
// Rules and messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    /// Diagnostic fires when the test is false.
    Assert,
    /// Diagnostic fires when the test is true.
    Report,
}

/// Message body with deferred-evaluation placeholders, resolved against the
/// context node when the test fires. Substitution is exact; nothing is
/// truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text(String),
    /// `<sch:name/>`: the context element's name.
    Name,
    /// `<sch:value-of select="…"/>`.
    ValueOf(Expr),
}

impl MessageTemplate {
    pub fn new(parts: Vec<MessagePart>) -> Self {
        Self { parts }
    }

    pub fn render(&self, arena: &NodeArena, ctx: usize) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                MessagePart::Text(s) => out.push_str(s),
                MessagePart::Name => out.push_str(&arena.node(ctx).name.local),
                MessagePart::ValueOf(expr) => out.push_str(&expr.eval(arena, ctx).string(arena)),
            }
        }
        crate::datatype::collapse(&out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchematronTest {
    pub kind: TestKind,
    pub test: Expr,
    pub message: MessageTemplate,
}

/// One compiled rule: a context path plus its tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SchematronRule {
    pub context: ContextPath,
    pub tests: Vec<SchematronTest>,
}

impl SchematronRule {
    /// Evaluate this rule at a context node it is known to match.
    pub fn evaluate(&self, arena: &NodeArena, node: usize) -> Vec<Diagnostic> {
        let location = arena.node(node).location;
        let mut out = Vec::new();
        for test in &self.tests {
            let holds = test.test.eval(arena, node).boolean();
            let fires = match test.kind {
                TestKind::Assert => !holds,
                TestKind::Report => holds,
            };
            if fires {
                let message = test.message.render(arena, node);
                let diagnostic = match test.kind {
                    TestKind::Assert => Diagnostic::error(location, message),
                    TestKind::Report => Diagnostic::warning(location, message),
                };
                out.push(diagnostic);
            }
        }
        out
    }
}
