//! Recursive-descent parser for executable documents.
//!
//! Two entry points:
//! - [`parse`]: a whole document with one or more operations
//! - [`parse_selections`]: a bare selection list, the shape of query fragments
//!   contributed by individual operations (`project(name: "x") { id }`)

use crate::ast::{
    Argument, Directive, Document, Field, Operation, OperationKind, Selection, TypeRef,
    Value, VariableDefinition,
};
use crate::lexer::{Token, TokenKind, lex, token_text};
use crate::{Error, Result};

/// Parse a complete document.
pub fn parse(source: &str) -> Result<Document> {
    let mut parser = Parser::new(source);
    let mut operations = Vec::new();
    while !parser.at_end() {
        operations.push(parser.operation()?);
    }
    Ok(Document { operations })
}

/// Parse a sequence of selections not wrapped in braces.
pub fn parse_selections(source: &str) -> Result<Vec<Selection>> {
    let mut parser = Parser::new(source);
    let mut selections = Vec::new();
    while !parser.at_end() {
        selections.push(parser.selection()?);
    }
    Ok(selections)
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        let tokens = lex(source)
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .collect();
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.tokens
            .get(self.pos)
            .is_some_and(|t| t.kind == TokenKind::Name && token_text(self.source, t) == keyword)
    }

    fn bump(&mut self) -> &'s str {
        let text = token_text(self.source, &self.tokens[self.pos]);
        self.pos += 1;
        text
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'s str> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error(kind.describe()))
        }
    }

    fn error(&self, expected: &'static str) -> Error {
        match self.tokens.get(self.pos) {
            Some(token) => Error::Syntax {
                offset: token.span.start,
                expected,
                found: token_text(self.source, token).to_string(),
            },
            None => Error::Syntax {
                offset: self.source.len(),
                expected,
                found: "end of input".to_string(),
            },
        }
    }

    fn name(&mut self) -> Result<String> {
        self.expect(TokenKind::Name).map(str::to_string)
    }

    fn operation(&mut self) -> Result<Operation> {
        if self.at(TokenKind::BraceOpen) {
            return Ok(Operation::query(None, self.selection_set()?));
        }

        let kind = if self.at_keyword("query") {
            OperationKind::Query
        } else if self.at_keyword("mutation") {
            OperationKind::Mutation
        } else if self.at_keyword("subscription") {
            OperationKind::Subscription
        } else {
            return Err(self.error("operation definition"));
        };
        self.bump();

        let name = if self.at(TokenKind::Name) {
            Some(self.name()?)
        } else {
            None
        };
        let variables = self.variable_definitions()?;
        let directives = self.directives()?;
        let selection_set = self.selection_set()?;

        Ok(Operation {
            kind,
            name,
            variables,
            directives,
            selection_set,
        })
    }

    fn variable_definitions(&mut self) -> Result<Vec<VariableDefinition>> {
        let mut variables = Vec::new();
        if !self.eat(TokenKind::ParenOpen) {
            return Ok(variables);
        }
        while !self.eat(TokenKind::ParenClose) {
            self.expect(TokenKind::Dollar)?;
            let name = self.name()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.type_ref()?;
            let default = if self.eat(TokenKind::Equals) {
                Some(self.value()?)
            } else {
                None
            };
            variables.push(VariableDefinition { name, ty, default });
        }
        Ok(variables)
    }

    fn type_ref(&mut self) -> Result<TypeRef> {
        let base = if self.eat(TokenKind::BracketOpen) {
            let inner = self.type_ref()?;
            self.expect(TokenKind::BracketClose)?;
            TypeRef::List(Box::new(inner))
        } else {
            TypeRef::Named(self.name()?)
        };
        if self.eat(TokenKind::Bang) {
            Ok(TypeRef::NonNull(Box::new(base)))
        } else {
            Ok(base)
        }
    }

    fn directives(&mut self) -> Result<Vec<Directive>> {
        let mut directives = Vec::new();
        while self.eat(TokenKind::At) {
            let name = self.name()?;
            let arguments = self.arguments()?;
            directives.push(Directive { name, arguments });
        }
        Ok(directives)
    }

    fn selection_set(&mut self) -> Result<Vec<Selection>> {
        self.expect(TokenKind::BraceOpen)?;
        let mut selections = Vec::new();
        while !self.eat(TokenKind::BraceClose) {
            if self.at_end() {
                return Err(self.error(TokenKind::BraceClose.describe()));
            }
            selections.push(self.selection()?);
        }
        Ok(selections)
    }

    fn selection(&mut self) -> Result<Selection> {
        if self.eat(TokenKind::Spread) {
            return self.fragment_selection();
        }
        self.field().map(Selection::Field)
    }

    fn fragment_selection(&mut self) -> Result<Selection> {
        if self.at(TokenKind::Name) && !self.at_keyword("on") {
            let name = self.name()?;
            let directives = self.directives()?;
            return Ok(Selection::FragmentSpread { name, directives });
        }

        let type_condition = if self.at_keyword("on") {
            self.bump();
            Some(self.name()?)
        } else {
            None
        };
        let directives = self.directives()?;
        let selection_set = self.selection_set()?;
        Ok(Selection::InlineFragment {
            type_condition,
            directives,
            selection_set,
        })
    }

    fn field(&mut self) -> Result<Field> {
        let first = self.name()?;
        let (alias, name) = if self.eat(TokenKind::Colon) {
            (Some(first), self.name()?)
        } else {
            (None, first)
        };
        let arguments = self.arguments()?;
        let directives = self.directives()?;
        let selection_set = if self.at(TokenKind::BraceOpen) {
            self.selection_set()?
        } else {
            Vec::new()
        };

        Ok(Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
        })
    }

    fn arguments(&mut self) -> Result<Vec<Argument>> {
        let mut arguments = Vec::new();
        if !self.eat(TokenKind::ParenOpen) {
            return Ok(arguments);
        }
        while !self.eat(TokenKind::ParenClose) {
            let name = self.name()?;
            self.expect(TokenKind::Colon)?;
            let value = self.value()?;
            arguments.push(Argument { name, value });
        }
        Ok(arguments)
    }

    fn value(&mut self) -> Result<Value> {
        let Some(kind) = self.peek() else {
            return Err(self.error("value"));
        };

        match kind {
            TokenKind::Dollar => {
                self.bump();
                Ok(Value::Variable(self.name()?))
            }
            TokenKind::IntLiteral => Ok(Value::Int(self.bump().to_string())),
            TokenKind::FloatLiteral => Ok(Value::Float(self.bump().to_string())),
            TokenKind::StringLiteral => {
                let offset = self.tokens[self.pos].span.start;
                let raw = self.bump();
                serde_json::from_str::<String>(raw)
                    .map(Value::String)
                    .map_err(|_| Error::Syntax {
                        offset,
                        expected: "valid string escape",
                        found: raw.to_string(),
                    })
            }
            TokenKind::Name => {
                let text = self.bump();
                Ok(match text {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    other => Value::Enum(other.to_string()),
                })
            }
            TokenKind::BracketOpen => {
                self.bump();
                let mut items = Vec::new();
                while !self.eat(TokenKind::BracketClose) {
                    items.push(self.value()?);
                }
                Ok(Value::List(items))
            }
            TokenKind::BraceOpen => {
                self.bump();
                let mut fields = Vec::new();
                while !self.eat(TokenKind::BraceClose) {
                    let name = self.name()?;
                    self.expect(TokenKind::Colon)?;
                    fields.push((name, self.value()?));
                }
                Ok(Value::Object(fields))
            }
            _ => Err(self.error("value")),
        }
    }
}
