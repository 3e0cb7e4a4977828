//! Recursive-descent parser for operating instructions.
//!
//! Grammar:
//!
//! ```text
//! instruction := "Rest" end
//!              | ("Discharge" | "Charge") "at" quantity end
//!              | "Hold" "at" quantity end
//! end         := "for" duration | "until" quantity
//! quantity    := number unit | "C/" number
//! unit        := A | mA | V | mV | W | mW | kW | C
//! duration    := number time-unit
//! ```
//!
//! Verbs and keywords are case-insensitive, quantity units are not.

use cf_core::units::constants::{
    SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE, SECONDS_PER_WEEK,
};
use cf_core::units::{Current, Power, Time, Voltage, amps, milliamps, millivolts, s, volts, watts};

use crate::error::{ParseError, ParseErrorKind};
use crate::step::{Drive, Operation, Step, StepEnd, Threshold};

const EXPECT_OPERATION: &str = "an operation (Discharge, Charge, Hold or Rest)";
const EXPECT_END: &str = "\"for\" or \"until\"";
const EXPECT_QUANTITY: &str = "a quantity such as \"1 A\", \"C/20\", \"4.1 V\" or \"2 W\"";
const EXPECT_QUANTITY_UNIT: &str = "a unit (A, mA, V, mV, W, mW, kW or C)";
const EXPECT_THRESHOLD_UNIT: &str = "a current or voltage unit (A, mA, V, mV or C)";
const EXPECT_TIME_UNIT: &str = "a time unit (seconds, minutes, hours, days or weeks)";

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Word(String),
    Number(f64),
    Slash,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    column: usize,
}

/// A quantity with its unit already applied.
#[derive(Debug, Clone, Copy)]
enum Quantity {
    CRate(f64),
    Current(Current),
    Voltage(Voltage),
    Power(Power),
}

/// Parse one instruction into a [`Step`].
pub fn parse_instruction(instruction: &str) -> Result<Step, ParseError> {
    let mut parser = Parser::new(instruction)?;
    if parser.tokens.is_empty() {
        return Err(parser.error(1, ParseErrorKind::Empty));
    }

    let operation = parser.operation()?;
    let drive = match operation {
        Operation::Rest => None,
        _ => {
            parser.expect_keyword("at", "\"at\"")?;
            let (quantity, _) = parser.quantity()?;
            Some(signed_drive(quantity, operation))
        }
    };
    let end = parser.step_end()?;
    parser.expect_end()?;

    Ok(Step {
        instruction: instruction.to_string(),
        operation,
        drive,
        end,
    })
}

/// Parse a standalone duration such as `"1 minute"` or `"2.5 hours"`.
pub fn parse_duration(text: &str) -> Result<Time, ParseError> {
    let mut parser = Parser::new(text)?;
    if parser.tokens.is_empty() {
        return Err(parser.error(1, ParseErrorKind::Empty));
    }
    let duration = parser.duration()?;
    parser.expect_end()?;
    Ok(duration)
}

fn signed_drive(quantity: Quantity, operation: Operation) -> Drive {
    let sign = operation.direction().map(|d| d.sign()).unwrap_or(1.0);
    match quantity {
        Quantity::CRate(rate) => Drive::CRate(sign * rate),
        Quantity::Current(i) => Drive::Current(i * sign),
        Quantity::Power(p) => Drive::Power(p * sign),
        Quantity::Voltage(v) => Drive::Voltage(v),
    }
}

struct Parser<'a> {
    instruction: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(instruction: &'a str) -> Result<Self, ParseError> {
        let tokens = tokenize(instruction)?;
        Ok(Self {
            instruction,
            tokens,
            pos: 0,
        })
    }

    fn error(&self, column: usize, kind: ParseErrorKind) -> ParseError {
        ParseError {
            instruction: self.instruction.to_string(),
            column,
            kind,
        }
    }

    fn end_column(&self) -> usize {
        self.instruction.chars().count() + 1
    }

    fn next(&mut self, expected: &'static str) -> Result<Token, ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(self.error(
                self.end_column(),
                ParseErrorKind::UnexpectedEnd { expected },
            )),
        }
    }

    fn unexpected(&self, tok: &Token, expected: &'static str) -> ParseError {
        self.error(
            tok.column,
            ParseErrorKind::UnexpectedToken {
                found: tok.text.clone(),
                expected,
            },
        )
    }

    fn expect_word(&mut self, expected: &'static str) -> Result<(String, usize), ParseError> {
        let tok = self.next(expected)?;
        match tok.kind {
            TokenKind::Word(ref w) => Ok((w.clone(), tok.column)),
            _ => Err(self.unexpected(&tok, expected)),
        }
    }

    fn expect_keyword(
        &mut self,
        keyword: &'static str,
        expected: &'static str,
    ) -> Result<(), ParseError> {
        let tok = self.next(expected)?;
        match tok.kind {
            TokenKind::Word(ref w) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            _ => Err(self.unexpected(&tok, expected)),
        }
    }

    fn expect_number(&mut self, expected: &'static str) -> Result<(f64, usize), ParseError> {
        let tok = self.next(expected)?;
        match tok.kind {
            TokenKind::Number(v) => Ok((v, tok.column)),
            _ => Err(self.unexpected(&tok, expected)),
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(tok) => Err(self.unexpected(tok, "end of instruction")),
        }
    }

    fn operation(&mut self) -> Result<Operation, ParseError> {
        let tok = self.next(EXPECT_OPERATION)?;
        let TokenKind::Word(ref verb) = tok.kind else {
            return Err(self.unexpected(&tok, EXPECT_OPERATION));
        };
        match verb.to_ascii_lowercase().as_str() {
            "discharge" => Ok(Operation::Discharge),
            "charge" => Ok(Operation::Charge),
            "hold" => Ok(Operation::Hold),
            "rest" => Ok(Operation::Rest),
            _ => Err(self.unexpected(&tok, EXPECT_OPERATION)),
        }
    }

    /// Returns the quantity and the column of its unit token.
    fn quantity(&mut self) -> Result<(Quantity, usize), ParseError> {
        let tok = self.next(EXPECT_QUANTITY)?;
        match tok.kind {
            TokenKind::Word(ref w) if w == "C" => {
                match self.next("\"/\"")? {
                    Token {
                        kind: TokenKind::Slash,
                        ..
                    } => {}
                    other => return Err(self.unexpected(&other, "\"/\"")),
                }
                let (divisor, column) = self.expect_number("a C-rate divisor")?;
                if divisor <= 0.0 {
                    return Err(self.error(column, ParseErrorKind::ZeroDivisor));
                }
                Ok((Quantity::CRate(1.0 / divisor), tok.column))
            }
            TokenKind::Number(value) => {
                let (unit, column) = self.expect_word(EXPECT_QUANTITY_UNIT)?;
                let quantity = match unit.as_str() {
                    "A" => Quantity::Current(amps(value)),
                    "mA" => Quantity::Current(milliamps(value)),
                    "V" => Quantity::Voltage(volts(value)),
                    "mV" => Quantity::Voltage(millivolts(value)),
                    "W" => Quantity::Power(watts(value)),
                    "mW" => Quantity::Power(watts(value * 1e-3)),
                    "kW" => Quantity::Power(watts(value * 1e3)),
                    "C" => Quantity::CRate(value),
                    _ => {
                        return Err(self.error(
                            column,
                            ParseErrorKind::UnknownUnit {
                                unit,
                                expected: EXPECT_QUANTITY_UNIT,
                            },
                        ));
                    }
                };
                Ok((quantity, column))
            }
            _ => Err(self.unexpected(&tok, EXPECT_QUANTITY)),
        }
    }

    fn step_end(&mut self) -> Result<StepEnd, ParseError> {
        let tok = self.next(EXPECT_END)?;
        let TokenKind::Word(ref keyword) = tok.kind else {
            return Err(self.unexpected(&tok, EXPECT_END));
        };
        match keyword.to_ascii_lowercase().as_str() {
            "for" => Ok(StepEnd::For(self.duration()?)),
            "until" => Ok(StepEnd::Until(self.threshold()?)),
            _ => Err(self.unexpected(&tok, EXPECT_END)),
        }
    }

    fn threshold(&mut self) -> Result<Threshold, ParseError> {
        let (quantity, unit_column) = self.quantity()?;
        match quantity {
            Quantity::CRate(rate) => Ok(Threshold::CRate(rate)),
            Quantity::Current(i) => Ok(Threshold::Current(i)),
            Quantity::Voltage(v) => Ok(Threshold::Voltage(v)),
            Quantity::Power(_) => {
                // The unit is the last token consumed by `quantity`.
                let unit = self.tokens[self.pos - 1].text.clone();
                Err(self.error(
                    unit_column,
                    ParseErrorKind::UnknownUnit {
                        unit,
                        expected: EXPECT_THRESHOLD_UNIT,
                    },
                ))
            }
        }
    }

    fn duration(&mut self) -> Result<Time, ParseError> {
        let (value, _) = self.expect_number("a duration")?;
        let (unit, column) = self.expect_word(EXPECT_TIME_UNIT)?;
        let scale = match unit.to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            "min" | "mins" | "minute" | "minutes" => SECONDS_PER_MINUTE,
            "h" | "hr" | "hrs" | "hour" | "hours" => SECONDS_PER_HOUR,
            "day" | "days" => SECONDS_PER_DAY,
            "week" | "weeks" => SECONDS_PER_WEEK,
            _ => {
                return Err(self.error(
                    column,
                    ParseErrorKind::UnknownUnit {
                        unit,
                        expected: EXPECT_TIME_UNIT,
                    },
                ));
            }
        };
        Ok(s(value * scale))
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() {
                let ch = chars[i];
                if ch.is_ascii_digit() || ch == '.' {
                    i += 1;
                } else if (ch == 'e' || ch == 'E') && exponent_follows(&chars, i + 1) {
                    i += 1;
                    if matches!(chars[i], '+' | '-') {
                        i += 1;
                    }
                } else {
                    break;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<f64>().map_err(|_| ParseError {
                instruction: input.to_string(),
                column,
                kind: ParseErrorKind::InvalidNumber(text.clone()),
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                text,
                column,
            });
        } else if c.is_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token {
                kind: TokenKind::Word(text.clone()),
                text,
                column,
            });
        } else if c == '/' {
            i += 1;
            tokens.push(Token {
                kind: TokenKind::Slash,
                text: "/".to_string(),
                column,
            });
        } else {
            return Err(ParseError {
                instruction: input.to_string(),
                column,
                kind: ParseErrorKind::UnexpectedCharacter(c),
            });
        }
    }

    Ok(tokens)
}

fn exponent_follows(chars: &[char], j: usize) -> bool {
    match chars.get(j) {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-') => chars.get(j + 1).is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}
