// used for persistence
use rusqlite::{Connection, params};
use roaring::RoaringTreemap;
use tracing::debug;

use crate::construct::{Term, ValueFactory};
use crate::error::{Result, SkosError};
use crate::store::{StatementId, TermId, Triple};

const KIND_IRI: i64 = 1;
const KIND_BLANK: i64 = 2;
const KIND_LITERAL: i64 = 3;

/// Where a graph keeps its statements besides memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    /// SQLite database file at the given path.
    File(String),
}

/// Everything a persisted graph held, with blank nodes minted afresh.
#[derive(Debug, Default)]
pub struct Restored {
    pub terms: Vec<(TermId, Term)>,
    pub statements: Vec<(StatementId, Triple)>,
}

// ------------- Persistence -------------
pub struct Persistor {
    connection: Connection,
}

impl Persistor {
    pub fn open(path: &str) -> Result<Self> {
        let connection = Connection::open(path)?;
        Self::with_connection(connection)
    }
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }
    fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists Term (
                Term_Identity integer not null,
                Kind integer not null,
                Namespace text null,
                Lexical text not null,
                Language text null,
                constraint referenceable_Term_Identity primary key (
                    Term_Identity
                )
            );
            create table if not exists Statement (
                Statement_Identity integer not null,
                Subject_Identity integer not null,
                Predicate_Identity integer not null,
                Object_Identity integer not null,
                constraint Subject_is_Term foreign key (
                    Subject_Identity
                ) references Term(Term_Identity),
                constraint Predicate_is_Term foreign key (
                    Predicate_Identity
                ) references Term(Term_Identity),
                constraint Object_is_Term foreign key (
                    Object_Identity
                ) references Term(Term_Identity),
                constraint referenceable_Statement_Identity primary key (
                    Statement_Identity
                )
            );
            ",
        )?;
        Ok(Self { connection })
    }

    /// Writes one changeset in a single transaction, including the terms
    /// it left unreferenced. Either all of it lands or none of it does.
    pub fn persist(
        &mut self,
        terms: &[(TermId, Term)],
        removed: &RoaringTreemap,
        added: &[(StatementId, Triple)],
        reclaimed: &[TermId],
    ) -> Result<()> {
        let transaction = self.connection.transaction()?;
        {
            let mut add_term = transaction.prepare_cached(
                "
                insert or ignore into Term (
                    Term_Identity,
                    Kind,
                    Namespace,
                    Lexical,
                    Language
                ) values (?, ?, ?, ?, ?)
            ",
            )?;
            for (id, term) in terms {
                let id = to_sql_id(*id)?;
                match term {
                    Term::Iri(iri) => add_term.execute(params![
                        id,
                        KIND_IRI,
                        iri.namespace(),
                        iri.local_name(),
                        Option::<String>::None
                    ])?,
                    Term::Blank(node) => add_term.execute(params![
                        id,
                        KIND_BLANK,
                        Option::<String>::None,
                        node.label(),
                        Option::<String>::None
                    ])?,
                    Term::Literal(literal) => add_term.execute(params![
                        id,
                        KIND_LITERAL,
                        Option::<String>::None,
                        literal.value(),
                        literal.language()
                    ])?,
                };
            }
            let mut remove_statement = transaction.prepare_cached(
                "
                delete from Statement
                    where Statement_Identity = ?
            ",
            )?;
            for id in removed.iter() {
                remove_statement.execute(params![to_sql_id(id)?])?;
            }
            let mut remove_term = transaction.prepare_cached(
                "
                delete from Term
                    where Term_Identity = ?
            ",
            )?;
            for id in reclaimed {
                remove_term.execute(params![to_sql_id(*id)?])?;
            }
            let mut add_statement = transaction.prepare_cached(
                "
                insert into Statement (
                    Statement_Identity,
                    Subject_Identity,
                    Predicate_Identity,
                    Object_Identity
                ) values (?, ?, ?, ?)
            ",
            )?;
            for (id, triple) in added {
                add_statement.execute(params![
                    to_sql_id(*id)?,
                    to_sql_id(triple.subject)?,
                    to_sql_id(triple.predicate)?,
                    to_sql_id(triple.object)?
                ])?;
            }
        }
        transaction.commit()?;
        debug!(
            terms = terms.len(),
            removed = removed.len(),
            added = added.len(),
            reclaimed = reclaimed.len(),
            "persisted changeset"
        );
        Ok(())
    }

    pub fn restore(&self, factory: &ValueFactory) -> Result<Restored> {
        let mut restored = Restored::default();
        let mut all_terms = self.connection.prepare(
            "
            select Term_Identity, Kind, Namespace, Lexical, Language
                from Term
        ",
        )?;
        let rows = all_terms.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        for row in rows {
            let (id, kind, namespace, lexical, language) = row?;
            let term = match kind {
                KIND_IRI => Term::Iri(factory.uri(namespace.as_deref().unwrap_or(""), &lexical)),
                // stored labels only need to be distinct within this graph, a fresh
                // node keeps them distinct within the process as well
                KIND_BLANK => Term::Blank(factory.blank_node()),
                KIND_LITERAL => Term::Literal(factory.literal(&lexical, language.as_deref())),
                other => {
                    return Err(SkosError::Persistence(format!(
                        "term {} has unknown kind {}",
                        id, other
                    )));
                }
            };
            restored.terms.push((from_sql_id(id)?, term));
        }
        let mut all_statements = self.connection.prepare(
            "
            select Statement_Identity, Subject_Identity, Predicate_Identity, Object_Identity
                from Statement
                order by Statement_Identity
        ",
        )?;
        let rows = all_statements.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        for row in rows {
            let (id, subject, predicate, object) = row?;
            restored.statements.push((
                from_sql_id(id)?,
                Triple {
                    subject: from_sql_id(subject)?,
                    predicate: from_sql_id(predicate)?,
                    object: from_sql_id(object)?,
                },
            ));
        }
        Ok(restored)
    }

    pub fn term_count(&self) -> Result<u64> {
        let count: i64 = self
            .connection
            .query_row("select count(*) from Term", [], |row| row.get(0))?;
        from_sql_id(count)
    }

    pub fn statement_count(&self) -> Result<u64> {
        let count: i64 = self
            .connection
            .query_row("select count(*) from Statement", [], |row| row.get(0))?;
        from_sql_id(count)
    }
}

fn to_sql_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| SkosError::Persistence(format!("identity {} out of range", id)))
}

fn from_sql_id(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| SkosError::Persistence(format!("negative identity {}", id)))
}
