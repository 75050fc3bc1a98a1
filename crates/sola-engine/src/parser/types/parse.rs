//! Parser for canonical type strings (`int[]|null`, `map[string]Box<T>`)
//!
//! Accepts everything [`Type`]'s `Display` produces, so rendering and parsing
//! round-trip. Used to seed the builtin table and by tests.

use thiserror::Error;

use super::ty::Type;

/// Malformed type string
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid type `{input}`: {message} at offset {offset}")]
pub struct TypeParseError {
    pub input: String,
    pub message: String,
    pub offset: usize,
}

impl Type {
    /// Parse a canonical type string
    pub fn parse(input: &str) -> Result<Type, TypeParseError> {
        let mut parser = TypeStringParser {
            input,
            chars: input.as_bytes(),
            pos: 0,
        };
        let ty = parser.parse_union()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

struct TypeStringParser<'a> {
    input: &'a str,
    chars: &'a [u8],
    pos: usize,
}

impl<'a> TypeStringParser<'a> {
    fn error(&self, message: &str) -> TypeParseError {
        TypeParseError {
            input: self.input.to_string(),
            message: message.to_string(),
            offset: self.pos,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), TypeParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", c as char)))
        }
    }

    fn parse_union(&mut self) -> Result<Type, TypeParseError> {
        let mut members = vec![self.parse_postfix()?];
        while self.eat(b'|') {
            members.push(self.parse_postfix()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            Type::union(members)
        })
    }

    fn parse_postfix(&mut self) -> Result<Type, TypeParseError> {
        let mut ty = self.parse_primary()?;
        while self.peek() == Some(b'[') {
            self.pos += 1;
            if self.eat(b']') {
                ty = Type::array(ty);
            } else {
                let size = self.parse_number()?;
                self.expect(b']')?;
                ty = Type::FixedArray(Box::new(ty), size);
            }
        }
        Ok(ty)
    }

    fn parse_number(&mut self) -> Result<usize, TypeParseError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| self.error("expected array size"))
    }

    fn parse_list(&mut self, close: u8) -> Result<Vec<Type>, TypeParseError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_union()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(b',')?;
        }
    }

    fn parse_name(&mut self) -> Result<&'a str, TypeParseError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'\\' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        let input = self.input;
        Ok(&input[start..self.pos])
    }

    fn parse_primary(&mut self) -> Result<Type, TypeParseError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let mut items = self.parse_list(b')')?;
                if items.len() == 1 {
                    Ok(items.remove(0))
                } else {
                    Ok(Type::Tuple(items))
                }
            }
            Some(b'?') => {
                self.pos += 1;
                Ok(self.parse_primary()?.nullable())
            }
            _ => {
                let name = self.parse_name()?;
                let next = self.peek();
                match name {
                    "func" if next == Some(b'(') => {
                        self.pos += 1;
                        let params = self.parse_list(b')')?;
                        self.expect(b':')?;
                        let ret = self.parse_union()?;
                        Ok(Type::func(params, ret))
                    }
                    "map" if next == Some(b'[') => {
                        self.pos += 1;
                        let key = self.parse_union()?;
                        self.expect(b']')?;
                        let value = self.parse_postfix()?;
                        Ok(Type::map(key, value))
                    }
                    _ if next == Some(b'<') => {
                        self.pos += 1;
                        let args = self.parse_list(b'>')?;
                        Ok(Type::Generic {
                            base: name.to_string(),
                            args,
                        })
                    }
                    _ => Ok(Type::from_name(name)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::ty::IntKind;

    fn roundtrip(s: &str) {
        let ty = Type::parse(s).unwrap();
        assert_eq!(ty.to_string(), s, "rendering of {s}");
        assert_eq!(Type::parse(&ty.to_string()).unwrap(), ty);
    }

    #[test]
    fn test_parse_primitives() {
        assert_eq!(Type::parse("int").unwrap(), Type::Int);
        assert_eq!(Type::parse("u8").unwrap(), Type::SizedInt(IntKind::U8));
        assert_eq!(Type::parse("array").unwrap(), Type::AnyArray);
        assert_eq!(Type::parse("SuperArray").unwrap(), Type::SuperArray);
    }

    #[test]
    fn test_parse_compound() {
        roundtrip("int[]");
        roundtrip("string[4]");
        roundtrip("map[string]int[]");
        roundtrip("Box<int, string>");
        roundtrip("func(int, string): bool");
        roundtrip("(int, string)");
        roundtrip("(int|null)[]");
        roundtrip("App\\Models\\User");
    }

    #[test]
    fn test_parse_union_and_nullable() {
        assert_eq!(
            Type::parse("?int").unwrap(),
            Type::union([Type::Int, Type::Null])
        );
        assert_eq!(
            Type::parse("string | null").unwrap(),
            Type::union([Type::String, Type::Null])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Type::parse("").is_err());
        assert!(Type::parse("int[").is_err());
        assert!(Type::parse("Box<int").is_err());
        assert!(Type::parse("int int").is_err());
    }
}
