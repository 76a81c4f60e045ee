//! Entity stream decoder.

use crate::entity::{Entity, CONTEXT_ID, CONTINUATION_ID, NAMESPACES_KEY, TOKEN_KEY};
use crate::error::{CodecError, CodecResult};
use crate::namespace::NamespaceRegistry;
use crate::token::{Token, TokenReader};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Read};

/// Decode a complete in-memory entity stream.
///
/// # Errors
///
/// Returns an error if the bytes do not form a valid entity stream.
pub fn parse_entities(bytes: &[u8]) -> CodecResult<Vec<Entity>> {
    let mut entities = Vec::new();
    EntityStreamParser::new().parse_stream(bytes, |e| -> CodecResult<()> {
        entities.push(e);
        Ok(())
    })?;
    Ok(entities)
}

/// Streaming decoder for the entity wire format.
///
/// A stream is a JSON array whose first element is the `@context` object,
/// followed by entity objects and optionally a closing `@continuation`.
/// Entities are handed to the caller one at a time as soon as their
/// closing brace has been read; nothing else is buffered.
///
/// Each parser owns the namespace registry of one decode session.
#[derive(Debug, Default)]
pub struct EntityStreamParser {
    pub(crate) namespaces: NamespaceRegistry,
    /// Raw property/reference key to compressed key.
    pub(crate) key_cache: HashMap<String, String>,
}

impl EntityStreamParser {
    /// Creates a parser with an empty namespace registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The namespace registry built so far.
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Decodes a stream from a reader, calling `emit` for every entity.
    ///
    /// The context entity is always emitted first. Errors returned by
    /// `emit` stop decoding and are returned unchanged; entities emitted
    /// before a failure stay valid.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the stream does not open with `[` and
    /// a context object, a parse error on malformed input or read
    /// failure, a namespace error if an identifier cannot be compressed,
    /// or whatever `emit` returns.
    pub fn parse_stream<R, F, E>(&mut self, reader: R, mut emit: F) -> Result<(), E>
    where
        R: Read,
        F: FnMut(Entity) -> Result<(), E>,
        E: From<CodecError>,
    {
        let mut tokens = TokenReader::new(BufReader::new(reader));
        self.parse_tokens(&mut tokens, &mut emit)
    }

    /// Decodes a stream from an already positioned token reader.
    ///
    /// # Errors
    ///
    /// See [`EntityStreamParser::parse_stream`].
    pub fn parse_tokens<R, F, E>(&mut self, tokens: &mut TokenReader<R>, emit: &mut F) -> Result<(), E>
    where
        R: BufRead,
        F: FnMut(Entity) -> Result<(), E>,
        E: From<CodecError>,
    {
        match tokens.next_token()? {
            Token::BeginArray => {}
            other => {
                return Err(CodecError::protocol(format!(
                    "expected '[' at start of document, found {}",
                    other.describe()
                ))
                .into())
            }
        }

        let context = self.read_context(tokens)?;
        emit(context)?;

        loop {
            match tokens.next_token_or_eof()? {
                Some(Token::BeginObject) => {
                    let entity = self.decode_entity(tokens)?;
                    emit(entity)?;
                }
                Some(Token::EndArray) => break,
                // The sender closed the stream between two entities.
                None => break,
                Some(other) => {
                    return Err(CodecError::protocol(format!(
                        "unexpected {} in entity array",
                        other.describe()
                    ))
                    .into())
                }
            }
        }

        Ok(())
    }

    fn read_context<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> CodecResult<Entity> {
        match tokens.next_token()? {
            Token::BeginObject => {}
            other => {
                return Err(CodecError::protocol(format!(
                    "first element must be a context object, found {}",
                    other.describe()
                )))
            }
        }

        let fields = Self::decode_plain_object(tokens)?;
        if fields.get("id").and_then(Value::as_str) != Some(CONTEXT_ID) {
            return Err(CodecError::protocol(
                "first entity in array must be a context",
            ));
        }

        let Some(Value::Object(table)) = fields.get(NAMESPACES_KEY) else {
            return Err(CodecError::protocol("context has no namespaces map"));
        };
        let mut namespaces = Vec::with_capacity(table.len());
        for (prefix, expansion) in table {
            let expansion = expansion.as_str().ok_or_else(|| {
                CodecError::protocol(format!("namespace '{prefix}' must map to a string"))
            })?;
            namespaces.push((prefix.clone(), expansion.to_string()));
        }
        self.namespaces.seed(namespaces);

        Ok(Entity {
            id: CONTEXT_ID.to_string(),
            properties: fields,
            ..Entity::default()
        })
    }

    /// Decodes the fields of an entity whose `{` has been consumed.
    pub(crate) fn decode_entity<R: BufRead>(
        &mut self,
        tokens: &mut TokenReader<R>,
    ) -> CodecResult<Entity> {
        let mut entity = Entity::default();
        let mut is_continuation = false;

        loop {
            let key = match tokens.next_token()? {
                Token::EndObject => return Ok(entity),
                Token::String(key) => key,
                other => {
                    return Err(tokens.error(format!("unexpected {} in entity", other.describe())))
                }
            };

            match key.as_str() {
                "id" => {
                    let id = match tokens.next_token()? {
                        Token::String(id) => id,
                        other => {
                            return Err(tokens
                                .error(format!("entity id must be a string, found {}", other.describe())))
                        }
                    };
                    if id == CONTINUATION_ID {
                        is_continuation = true;
                        entity.id = id;
                    } else {
                        entity.id = self.namespaces.compress(&id)?;
                    }
                }
                "recorded" => entity.recorded = read_recorded(tokens)?,
                "deleted" => {
                    entity.deleted = match tokens.next_token()? {
                        Token::Bool(b) => b,
                        Token::Null => false,
                        other => {
                            return Err(tokens
                                .error(format!("deleted must be a bool, found {}", other.describe())))
                        }
                    }
                }
                "props" => entity.properties = self.decode_properties(tokens)?,
                "refs" => entity.references = self.decode_references(tokens)?,
                "token" => {
                    if !is_continuation {
                        return Err(tokens.error(
                            "token property found but not a continuation entity",
                        ));
                    }
                    let token = match tokens.next_token()? {
                        Token::String(token) => token,
                        other => {
                            return Err(tokens.error(format!(
                                "continuation token must be a string, found {}",
                                other.describe()
                            )))
                        }
                    };
                    entity.properties =
                        BTreeMap::from([(TOKEN_KEY.to_string(), Value::String(token))]);
                }
                _ => tokens.skip_value()?,
            }
        }
    }
}

fn read_recorded<R: BufRead>(tokens: &mut TokenReader<R>) -> CodecResult<u64> {
    match tokens.next_token()? {
        Token::Null => Ok(0),
        Token::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            match n.as_f64() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Some(f) if f.is_finite() && f >= 0.0 => Ok(f as u64),
                _ => Err(tokens.error(format!("recorded must be an unsigned integer, found {n}"))),
            }
        }
        other => Err(tokens.error(format!(
            "recorded must be a number, found {}",
            other.describe()
        ))),
    }
}
