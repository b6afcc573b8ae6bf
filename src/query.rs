//! Read-only queries against a [`Graph`].
//!
//! The language is a small SPARQL flavoured subset, see `query.pest` for the
//! grammar. Triple patterns are joined in the order they are written, each
//! one answered by [`Graph::matches`] with the positions bound so far.
//! Optional groups extend solutions when they can and keep them as they are
//! otherwise. Filters apply to every solution of the group they appear in.
//!
//! ```text
//! select ?concept ?label
//! where {
//!     ?concept a skos:Concept .
//!     ?concept skos:prefLabel ?label .
//!     filter(lang(?label) = "en" && regex(?label, "^La", "i"))
//! }
//! order by desc(?label)
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

// used to parse queries
use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest_derive::Parser;

// used for regex filters
use regex::{Regex, RegexBuilder};

use tracing::debug;

use crate::construct::{Iri, Term, ValueFactory};
use crate::error::{Result, SkosError};
use crate::store::{Graph, IdHasher};
use crate::vocab::{WELL_KNOWN_PREFIXES, rdf};

#[derive(Parser)]
#[grammar = "query.pest"]
struct QueryParser;

// ------------- Query -------------
#[derive(Clone, Debug)]
enum PatternTerm {
    Variable(String),
    Constant(Term),
}

#[derive(Clone, Debug)]
struct TriplePattern {
    subject: PatternTerm,
    predicate: PatternTerm,
    object: PatternTerm,
}

#[derive(Clone, Debug)]
enum GroupElement {
    Triple(TriplePattern),
    Optional(Group),
    Filter(Expression),
}

#[derive(Clone, Debug, Default)]
struct Group {
    elements: Vec<GroupElement>,
}

#[derive(Clone, Debug)]
enum Operand {
    Variable(String),
    Lang(String),
    Str(String),
    Constant(Term),
}

#[derive(Clone, Debug)]
enum Expression {
    Or(Vec<Expression>),
    And(Vec<Expression>),
    Not(Box<Expression>),
    Compare { left: Operand, right: Operand, equal: bool },
    Regex { operand: Operand, regex: Regex },
    Bound(String),
    IsIri(String),
    IsBlank(String),
    IsLiteral(String),
}

#[derive(Clone, Debug)]
struct OrderCondition {
    variable: String,
    descending: bool,
}

#[derive(Clone, Debug)]
struct Query {
    // None stands for `*`
    projection: Option<Vec<String>>,
    distinct: bool,
    group: Group,
    order: Vec<OrderCondition>,
    limit: Option<usize>,
    offset: usize,
    // variables in order of first appearance
    mentioned: Vec<String>,
}

type Bindings = HashMap<String, Term, IdHasher>;

// ------------- QueryResultsTable -------------
/// Rows of values, one column per projected variable. A cell is absent when
/// its variable was left unbound, which only optional groups can cause.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResultsTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Term>>>,
}

impl QueryResultsTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn rows(&self) -> &[Vec<Option<Term>>] {
        &self.rows
    }
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim_start_matches(['?', '$']);
        self.columns.iter().position(|column| column == name)
    }
    pub fn value(&self, row: usize, column: usize) -> Option<&Term> {
        self.rows.get(row)?.get(column)?.as_ref()
    }
    /// Every cell of a column, absent cells skipped.
    pub fn column_values(&self, name: &str) -> Vec<&Term> {
        match self.column_index(name) {
            Some(column) => self
                .rows
                .iter()
                .filter_map(|row| row.get(column).and_then(Option::as_ref))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for QueryResultsTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    Some(term) => term.to_string(),
                    None => String::from("null"),
                })
                .collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

// ------------- Engine -------------
pub struct Engine<'en> {
    graph: &'en Graph,
}

impl<'en> Engine<'en> {
    pub fn new(graph: &'en Graph) -> Self {
        Self { graph }
    }

    pub fn execute(&self, query: &str) -> Result<QueryResultsTable> {
        debug!(query, "executing query");
        let query = parse(query, self.graph.factory())?;
        let solutions = self.evaluate_group(&query.group, vec![Bindings::default()]);
        Ok(finish(&query, solutions))
    }

    fn evaluate_group(&self, group: &Group, seeds: Vec<Bindings>) -> Vec<Bindings> {
        let mut solutions = seeds;
        let mut filters = Vec::new();
        for element in &group.elements {
            solutions = match element {
                GroupElement::Triple(pattern) => solutions
                    .into_iter()
                    .flat_map(|solution| self.extend(pattern, solution))
                    .collect(),
                GroupElement::Optional(optional) => solutions
                    .into_iter()
                    .flat_map(|solution| {
                        let extended = self.evaluate_group(optional, vec![solution.clone()]);
                        if extended.is_empty() {
                            vec![solution]
                        } else {
                            extended
                        }
                    })
                    .collect(),
                GroupElement::Filter(expression) => {
                    filters.push(expression);
                    solutions
                }
            };
        }
        solutions.retain(|solution| filters.iter().all(|filter| filter.holds(solution)));
        solutions
    }

    fn extend(&self, pattern: &TriplePattern, solution: Bindings) -> Vec<Bindings> {
        let subject = match resolve(&pattern.subject, &solution) {
            Some(term) => match term.to_subject() {
                Some(subject) => Some(subject),
                None => return Vec::new(),
            },
            None => None,
        };
        let predicate: Option<Iri> = match resolve(&pattern.predicate, &solution) {
            Some(Term::Iri(iri)) => Some(iri),
            Some(_) => return Vec::new(),
            None => None,
        };
        let object = resolve(&pattern.object, &solution);
        let mut extended = Vec::new();
        for statement in self
            .graph
            .matches(subject.as_ref(), predicate.as_ref(), object.as_ref())
        {
            let mut candidate = solution.clone();
            let consistent = bind(&mut candidate, &pattern.subject, statement.subject().to_term())
                && bind(&mut candidate, &pattern.predicate, Term::Iri(statement.predicate().clone()))
                && bind(&mut candidate, &pattern.object, statement.object().clone());
            if consistent {
                extended.push(candidate);
            }
        }
        extended
    }
}

fn resolve(position: &PatternTerm, solution: &Bindings) -> Option<Term> {
    match position {
        PatternTerm::Constant(term) => Some(term.clone()),
        PatternTerm::Variable(name) => solution.get(name).cloned(),
    }
}

// A variable repeated within one pattern must bind the same term everywhere.
fn bind(solution: &mut Bindings, position: &PatternTerm, term: Term) -> bool {
    match position {
        PatternTerm::Constant(_) => true,
        PatternTerm::Variable(name) => match solution.get(name) {
            Some(bound) => *bound == term,
            None => {
                solution.insert(name.clone(), term);
                true
            }
        },
    }
}

fn finish(query: &Query, mut solutions: Vec<Bindings>) -> QueryResultsTable {
    if !query.order.is_empty() {
        solutions.sort_by(|a, b| {
            for condition in &query.order {
                let ordering = compare_terms(a.get(&condition.variable), b.get(&condition.variable));
                let ordering = if condition.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
    let columns = query
        .projection
        .clone()
        .unwrap_or_else(|| query.mentioned.clone());
    let mut rows: Vec<Vec<Option<Term>>> = solutions
        .into_iter()
        .map(|solution| {
            columns
                .iter()
                .map(|column| solution.get(column).cloned())
                .collect()
        })
        .collect();
    if query.distinct {
        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row.clone()));
    }
    let rows = rows
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    QueryResultsTable { columns, rows }
}

// Unbound sorts first, then blank nodes, IRIs and literals.
fn compare_terms(a: Option<&Term>, b: Option<&Term>) -> Ordering {
    fn rank(term: Option<&Term>) -> u8 {
        match term {
            None => 0,
            Some(Term::Blank(_)) => 1,
            Some(Term::Iri(_)) => 2,
            Some(Term::Literal(_)) => 3,
        }
    }
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Some(Term::Literal(x)), Some(Term::Literal(y))) => x
            .value()
            .cmp(y.value())
            .then_with(|| x.language().cmp(&y.language())),
        (Some(x), Some(y)) => x.lexical().cmp(&y.lexical()),
        _ => Ordering::Equal,
    })
}

// ------------- Filters -------------
impl Operand {
    fn value(&self, solution: &Bindings) -> Option<Term> {
        let factory = ValueFactory::new();
        match self {
            Operand::Constant(term) => Some(term.clone()),
            Operand::Variable(name) => solution.get(name).cloned(),
            Operand::Lang(name) => match solution.get(name)? {
                Term::Literal(literal) => Some(Term::Literal(
                    factory.literal(literal.language().unwrap_or(""), None),
                )),
                _ => None,
            },
            Operand::Str(name) => match solution.get(name)? {
                Term::Blank(_) => None,
                term => Some(Term::Literal(factory.literal(&term.lexical(), None))),
            },
        }
    }
}

impl Expression {
    // Anything evaluated against an unbound variable is false.
    fn holds(&self, solution: &Bindings) -> bool {
        match self {
            Expression::Or(alternatives) => alternatives.iter().any(|e| e.holds(solution)),
            Expression::And(conjuncts) => conjuncts.iter().all(|e| e.holds(solution)),
            Expression::Not(inner) => !inner.holds(solution),
            Expression::Compare { left, right, equal } => {
                match (left.value(solution), right.value(solution)) {
                    (Some(l), Some(r)) => (l == r) == *equal,
                    _ => false,
                }
            }
            Expression::Regex { operand, regex } => match operand.value(solution) {
                Some(Term::Blank(_)) | None => false,
                Some(term) => regex.is_match(&term.lexical()),
            },
            Expression::Bound(name) => solution.contains_key(name),
            Expression::IsIri(name) => matches!(solution.get(name), Some(Term::Iri(_))),
            Expression::IsBlank(name) => matches!(solution.get(name), Some(Term::Blank(_))),
            Expression::IsLiteral(name) => matches!(solution.get(name), Some(Term::Literal(_))),
        }
    }
}

// ------------- Parsing -------------
fn parse_error(error: pest::error::Error<Rule>) -> SkosError {
    let (line, col) = match error.line_col {
        LineColLocation::Pos((line, col)) => (line, col),
        LineColLocation::Span((line, col), _) => (line, col),
    };
    SkosError::Parse {
        message: error.variant.message().into_owned(),
        line: Some(line),
        col: Some(col),
    }
}

fn parse(text: &str, factory: &ValueFactory) -> Result<Query> {
    let root = QueryParser::parse(Rule::query, text)
        .map_err(parse_error)?
        .next()
        .ok_or_else(|| SkosError::Invariant("empty query parse".into()))?;
    let mut builder = QueryBuilder::new(factory);
    let mut query = Query {
        projection: None,
        distinct: false,
        group: Group::default(),
        order: Vec::new(),
        limit: None,
        offset: 0,
        mentioned: Vec::new(),
    };
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::prologue => {
                for declaration in pair.into_inner() {
                    let mut parts = declaration.into_inner();
                    let (Some(prefix), Some(iri)) = (parts.next(), parts.next()) else {
                        continue;
                    };
                    let prefix = prefix.as_str().trim_end_matches(':').to_string();
                    builder.prefixes.insert(prefix, strip_brackets(iri.as_str()).to_string());
                }
            }
            Rule::select_clause => {
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::distinct => query.distinct = true,
                        Rule::projection => {
                            let variables: Vec<String> = part
                                .into_inner()
                                .filter(|p| p.as_rule() == Rule::variable)
                                .map(|p| variable_name(p.as_str()))
                                .collect();
                            if !variables.is_empty() {
                                query.projection = Some(variables);
                            }
                        }
                        _ => (),
                    }
                }
            }
            Rule::where_clause => {
                if let Some(group) = pair.into_inner().next() {
                    query.group = builder.group(group)?;
                }
            }
            Rule::modifiers => {
                for modifier in pair.into_inner() {
                    match modifier.as_rule() {
                        Rule::order_clause => {
                            for condition in modifier.into_inner() {
                                query.order.push(order_condition(condition));
                            }
                        }
                        Rule::limit_clause => query.limit = Some(integer(modifier)?),
                        Rule::offset_clause => query.offset = integer(modifier)?,
                        _ => (),
                    }
                }
            }
            _ => (),
        }
    }
    query.mentioned = builder.mentioned;
    Ok(query)
}

fn variable_name(text: &str) -> String {
    text.trim_start_matches(['?', '$']).to_string()
}

fn strip_brackets(text: &str) -> &str {
    text.trim_start_matches('<').trim_end_matches('>')
}

fn integer(pair: Pair<Rule>) -> Result<usize> {
    let text = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    text.parse::<usize>()
        .map_err(|e| SkosError::MalformedInput(format!("'{}': {}", text, e)))
}

fn order_condition(pair: Pair<Rule>) -> OrderCondition {
    let mut descending = false;
    let mut variable = String::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::order_direction => descending = part.as_str().eq_ignore_ascii_case("desc"),
            Rule::variable => variable = variable_name(part.as_str()),
            _ => (),
        }
    }
    OrderCondition { variable, descending }
}

fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some('r') => unescaped.push('\r'),
            Some(other) => unescaped.push(other),
            None => (),
        }
    }
    unescaped
}

struct QueryBuilder<'f> {
    factory: &'f ValueFactory,
    prefixes: HashMap<String, String>,
    mentioned: Vec<String>,
}

impl<'f> QueryBuilder<'f> {
    fn new(factory: &'f ValueFactory) -> Self {
        let prefixes = WELL_KNOWN_PREFIXES
            .iter()
            .map(|(prefix, namespace)| (prefix.to_string(), namespace.to_string()))
            .collect();
        Self {
            factory,
            prefixes,
            mentioned: Vec::new(),
        }
    }

    fn mention(&mut self, name: &str) {
        if !self.mentioned.iter().any(|known| known == name) {
            self.mentioned.push(name.to_string());
        }
    }

    fn group(&mut self, pair: Pair<Rule>) -> Result<Group> {
        let mut group = Group::default();
        for element in pair.into_inner() {
            match element.as_rule() {
                Rule::triple_pattern => {
                    let mut positions = Vec::with_capacity(3);
                    for position in element.into_inner() {
                        positions.push(self.pattern_term(position)?);
                    }
                    let mut positions = positions.into_iter();
                    match (positions.next(), positions.next(), positions.next()) {
                        (Some(subject), Some(predicate), Some(object)) => {
                            group.elements.push(GroupElement::Triple(TriplePattern {
                                subject,
                                predicate,
                                object,
                            }))
                        }
                        _ => {
                            return Err(SkosError::Invariant(
                                "triple pattern without three positions".into(),
                            ));
                        }
                    }
                }
                Rule::optional_group => {
                    if let Some(inner) = element.into_inner().next() {
                        group.elements.push(GroupElement::Optional(self.group(inner)?));
                    }
                }
                Rule::filter => {
                    if let Some(inner) = element.into_inner().next() {
                        group.elements.push(GroupElement::Filter(self.expression(inner)?));
                    }
                }
                _ => (),
            }
        }
        Ok(group)
    }

    fn pattern_term(&mut self, pair: Pair<Rule>) -> Result<PatternTerm> {
        match pair.as_rule() {
            Rule::variable => {
                let name = variable_name(pair.as_str());
                self.mention(&name);
                Ok(PatternTerm::Variable(name))
            }
            Rule::a_keyword => Ok(PatternTerm::Constant(Term::Iri(
                self.factory.uri(rdf::NS, rdf::TYPE),
            ))),
            _ => Ok(PatternTerm::Constant(self.constant(pair)?)),
        }
    }

    fn constant(&self, pair: Pair<Rule>) -> Result<Term> {
        match pair.as_rule() {
            Rule::iri_ref => Ok(Term::Iri(Iri::parse(strip_brackets(pair.as_str())))),
            Rule::prefixed_name => {
                let text = pair.as_str();
                let (prefix, local_name) = text.split_once(':').unwrap_or(("", text));
                match self.prefixes.get(prefix) {
                    Some(namespace) => Ok(Term::Iri(Iri::new(namespace, local_name))),
                    None => Err(SkosError::MalformedInput(format!(
                        "undeclared prefix '{}:'",
                        prefix
                    ))),
                }
            }
            Rule::literal => {
                let mut value = String::new();
                let mut language = None;
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::string => value = string_value(part),
                        Rule::language_tag => {
                            language = Some(part.as_str().trim_start_matches('@').to_string())
                        }
                        _ => (),
                    }
                }
                Ok(Term::Literal(self.factory.literal(&value, language.as_deref())))
            }
            other => Err(SkosError::Invariant(format!("unexpected term {:?}", other))),
        }
    }

    fn operand(&self, pair: Pair<Rule>) -> Result<Operand> {
        let inner_variable = |pair: Pair<Rule>| {
            pair.into_inner()
                .next()
                .map(|p| variable_name(p.as_str()))
                .unwrap_or_default()
        };
        match pair.as_rule() {
            Rule::variable => Ok(Operand::Variable(variable_name(pair.as_str()))),
            Rule::lang_call => Ok(Operand::Lang(inner_variable(pair))),
            Rule::str_call => Ok(Operand::Str(inner_variable(pair))),
            _ => Ok(Operand::Constant(self.constant(pair)?)),
        }
    }

    fn expression(&self, pair: Pair<Rule>) -> Result<Expression> {
        let rule = pair.as_rule();
        match rule {
            Rule::expression | Rule::conjunction => {
                let mut parts = pair
                    .into_inner()
                    .map(|p| self.expression(p))
                    .collect::<Result<Vec<Expression>>>()?;
                if parts.len() == 1 {
                    return parts.pop().ok_or_else(|| SkosError::Invariant("empty expression".into()));
                }
                Ok(if rule == Rule::expression {
                    Expression::Or(parts)
                } else {
                    Expression::And(parts)
                })
            }
            Rule::unary => {
                let mut negated = false;
                let mut inner = None;
                for part in pair.into_inner() {
                    if part.as_rule() == Rule::negation {
                        negated = true;
                    } else {
                        inner = Some(self.expression(part)?);
                    }
                }
                let inner = inner.ok_or_else(|| SkosError::Invariant("empty unary".into()))?;
                Ok(if negated {
                    Expression::Not(Box::new(inner))
                } else {
                    inner
                })
            }
            Rule::comparison => {
                let mut parts = pair.into_inner();
                let (Some(left), Some(comparator), Some(right)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(SkosError::Invariant("incomplete comparison".into()));
                };
                Ok(Expression::Compare {
                    left: self.operand(left)?,
                    equal: comparator.as_str() == "=",
                    right: self.operand(right)?,
                })
            }
            Rule::regex_call => {
                let mut parts = pair.into_inner();
                let operand = match parts.next() {
                    Some(operand) => self.operand(operand)?,
                    None => return Err(SkosError::Invariant("regex without operand".into())),
                };
                let pattern = parts.next().map(string_value).unwrap_or_default();
                let flags = parts.next().map(string_value).unwrap_or_default();
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(flags.contains('i'))
                    .multi_line(flags.contains('m'))
                    .dot_matches_new_line(flags.contains('s'))
                    .build()?;
                Ok(Expression::Regex { operand, regex })
            }
            Rule::bound_call | Rule::is_iri_call | Rule::is_blank_call | Rule::is_literal_call => {
                let name = pair
                    .into_inner()
                    .next()
                    .map(|p| variable_name(p.as_str()))
                    .unwrap_or_default();
                Ok(match rule {
                    Rule::bound_call => Expression::Bound(name),
                    Rule::is_iri_call => Expression::IsIri(name),
                    Rule::is_blank_call => Expression::IsBlank(name),
                    _ => Expression::IsLiteral(name),
                })
            }
            other => Err(SkosError::Invariant(format!("unexpected expression {:?}", other))),
        }
    }
}

fn string_value(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|inner| unescape(inner.as_str()))
        .unwrap_or_default()
}
