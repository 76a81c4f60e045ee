//! Property, reference, and context value decoding.

use crate::decoder::EntityStreamParser;
use crate::error::CodecResult;
use crate::token::{Token, TokenReader};
use crate::value::{RefValue, Value};
use std::collections::BTreeMap;
use std::io::BufRead;

impl EntityStreamParser {
    /// Decodes a `props` object. `null` is read as an empty map.
    pub(crate) fn decode_properties<R: BufRead>(
        &mut self,
        tokens: &mut TokenReader<R>,
    ) -> CodecResult<BTreeMap<String, Value>> {
        let mut props = BTreeMap::new();
        match tokens.next_token()? {
            Token::BeginObject => {}
            Token::Null => return Ok(props),
            other => {
                return Err(tokens.error(format!("props must be an object, found {}", other.describe())))
            }
        }

        loop {
            let key = match tokens.next_token()? {
                Token::EndObject => return Ok(props),
                Token::String(key) => key,
                other => return Err(tokens.error(format!("unexpected {} in props", other.describe()))),
            };
            if let Some(value) = self.decode_value(tokens)? {
                let name = self.resolve_key(&key)?;
                props.insert(name, value);
            }
        }
    }

    /// Decodes a `refs` object. `null` is read as an empty map.
    pub(crate) fn decode_references<R: BufRead>(
        &mut self,
        tokens: &mut TokenReader<R>,
    ) -> CodecResult<BTreeMap<String, RefValue>> {
        let mut refs = BTreeMap::new();
        match tokens.next_token()? {
            Token::BeginObject => {}
            Token::Null => return Ok(refs),
            other => {
                return Err(tokens.error(format!("refs must be an object, found {}", other.describe())))
            }
        }

        loop {
            let key = match tokens.next_token()? {
                Token::EndObject => return Ok(refs),
                Token::String(key) => key,
                other => return Err(tokens.error(format!("unexpected {} in refs", other.describe()))),
            };
            if let Some(value) = self.decode_ref_value(tokens)? {
                let name = self.resolve_key(&key)?;
                refs.insert(name, value);
            }
        }
    }

    /// Decodes one property value; `None` means the value was `null`.
    fn decode_value<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> CodecResult<Option<Value>> {
        match tokens.next_token()? {
            Token::Null => Ok(None),
            token => self.value_from_token(tokens, token).map(Some),
        }
    }

    fn value_from_token<R: BufRead>(
        &mut self,
        tokens: &mut TokenReader<R>,
        token: Token,
    ) -> CodecResult<Value> {
        match token {
            Token::Null => Ok(Value::Null),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Number(n) => Ok(Value::Number(n)),
            Token::String(s) => Ok(Value::String(s)),
            Token::BeginArray => self.decode_list(tokens).map(Value::List),
            Token::BeginObject => self
                .decode_entity(tokens)
                .map(|e| Value::Entity(Box::new(e))),
            other => Err(tokens.error(format!("unexpected {} in value", other.describe()))),
        }
    }

    /// Lists keep their `null` elements.
    fn decode_list<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> CodecResult<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            match tokens.next_token()? {
                Token::EndArray => return Ok(items),
                token => items.push(self.value_from_token(tokens, token)?),
            }
        }
    }

    fn decode_ref_value<R: BufRead>(
        &mut self,
        tokens: &mut TokenReader<R>,
    ) -> CodecResult<Option<RefValue>> {
        match tokens.next_token()? {
            Token::Null => Ok(None),
            Token::String(id) => Ok(Some(RefValue::Single(self.namespaces.compress(&id)?))),
            Token::BeginArray => {
                let mut ids = Vec::new();
                loop {
                    match tokens.next_token()? {
                        Token::EndArray => return Ok(Some(RefValue::Many(ids))),
                        Token::String(id) => ids.push(self.namespaces.compress(&id)?),
                        Token::BeginArray => {
                            return Err(tokens.error("nested arrays not supported in references"))
                        }
                        other => {
                            return Err(tokens.error(format!(
                                "unexpected {} in reference list",
                                other.describe()
                            )))
                        }
                    }
                }
            }
            other => Err(tokens.error(format!(
                "unexpected {} as reference value",
                other.describe()
            ))),
        }
    }

    /// Compresses a property or reference key, memoized per session.
    fn resolve_key(&mut self, key: &str) -> CodecResult<String> {
        if let Some(name) = self.key_cache.get(key) {
            return Ok(name.clone());
        }
        let name = self.namespaces.compress(key)?;
        self.key_cache.insert(key.to_string(), name.clone());
        Ok(name)
    }

    /// Decodes the fields of an object verbatim, without namespace
    /// resolution. Used for the context, whose `{` has been consumed.
    pub(crate) fn decode_plain_object<R: BufRead>(
        tokens: &mut TokenReader<R>,
    ) -> CodecResult<BTreeMap<String, Value>> {
        let mut fields = BTreeMap::new();
        loop {
            let key = match tokens.next_token()? {
                Token::EndObject => return Ok(fields),
                Token::String(key) => key,
                other => return Err(tokens.error(format!("unexpected {} in object", other.describe()))),
            };
            let token = tokens.next_token()?;
            let value = Self::plain_value(tokens, token)?;
            fields.insert(key, value);
        }
    }

    fn plain_value<R: BufRead>(tokens: &mut TokenReader<R>, token: Token) -> CodecResult<Value> {
        match token {
            Token::Null => Ok(Value::Null),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Number(n) => Ok(Value::Number(n)),
            Token::String(s) => Ok(Value::String(s)),
            Token::BeginObject => Self::decode_plain_object(tokens).map(Value::Object),
            Token::BeginArray => {
                let mut items = Vec::new();
                loop {
                    match tokens.next_token()? {
                        Token::EndArray => return Ok(Value::List(items)),
                        token => items.push(Self::plain_value(tokens, token)?),
                    }
                }
            }
            other => Err(tokens.error(format!("unexpected {} in value", other.describe()))),
        }
    }
}
