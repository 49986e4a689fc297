//! Built-in dice expression evaluator.
//!
//! Supports the subset of dice arithmetic the pipeline needs:
//!
//! - integers and decimals, `+ - * /`, unary minus, parentheses
//! - dice terms `NdS` (`1d20`, `2d6`, bare `d8`)
//! - context variables `@bab`, `@abilities.str.mod`, `@conditionals.flank`
//! - `floor`, `ceil`, `min`, `max` (iterative-attack count formulas)
//!
//! Parsing and evaluation are fused; a malformed expression yields
//! [`RollOutcome::failed`] rather than a panic.

use crate::snapshot::EvalContext;

use super::rng::{RngOracle, compute_seed};
use super::{DieRoll, FormulaOracle, RollOutcome};

/// Formula evaluator backed by a seed-addressed [`RngOracle`].
pub struct DiceFormula<R: RngOracle> {
    rng: R,
}

impl<R: RngOracle> DiceFormula<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngOracle> FormulaOracle for DiceFormula<R> {
    fn evaluate(&self, formula: &str, ctx: &EvalContext<'_>, seed: u64) -> RollOutcome {
        let mut parser = Parser {
            input: formula.as_bytes(),
            pos: 0,
            ctx,
            rng: &self.rng,
            seed,
            dice: Vec::new(),
        };

        match parser.parse_full() {
            Ok(total) => RollOutcome {
                total,
                dice: parser.dice,
                error: false,
            },
            Err(()) => RollOutcome::failed(),
        }
    }
}

struct Parser<'a, R: RngOracle> {
    input: &'a [u8],
    pos: usize,
    ctx: &'a EvalContext<'a>,
    rng: &'a R,
    seed: u64,
    dice: Vec<DieRoll>,
}

impl<'a, R: RngOracle> Parser<'a, R> {
    fn parse_full(&mut self) -> Result<f64, ()> {
        self.skip_ws();
        if self.pos == self.input.len() {
            // Empty formulas are treated as zero contribution.
            return Ok(0.0);
        }
        let value = self.expr()?;
        self.skip_ws();
        if self.pos != self.input.len() {
            return Err(());
        }
        Ok(value)
    }

    fn expr(&mut self) -> Result<f64, ()> {
        let mut value = self.term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ()> {
        let mut value = self.factor()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(());
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, ()> {
        self.skip_ws();
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.expect(b')')?;
                Ok(value)
            }
            Some(b'@') => {
                self.pos += 1;
                let path = self.ident_path()?;
                self.ctx.var(&path).ok_or(())
            }
            Some(c) if c.is_ascii_digit() => self.number_or_dice(),
            Some(b'd') => self.dice_term(1),
            Some(c) if c.is_ascii_alphabetic() => self.function(),
            _ => Err(()),
        }
    }

    /// A leading integer is either a plain number, the count of a dice
    /// term, or the integer part of a decimal.
    fn number_or_dice(&mut self) -> Result<f64, ()> {
        let int = self.integer()?;
        match self.peek() {
            Some(b'd') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.dice_term(int)
            }
            Some(b'.') => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(());
                }
                let text = core::str::from_utf8(&self.input[start..self.pos]).map_err(|_| ())?;
                let frac: f64 = format!("0.{text}").parse().map_err(|_| ())?;
                Ok(int as f64 + frac)
            }
            _ => Ok(int as f64),
        }
    }

    fn dice_term(&mut self, count: u64) -> Result<f64, ()> {
        self.expect(b'd')?;
        let sides = self.integer()?;
        if sides == 0 || count > 1000 {
            return Err(());
        }
        let mut sum = 0u64;
        for _ in 0..count {
            let ordinal = self.dice.len() as u32;
            let die_seed = compute_seed(self.seed, ordinal, sides as u32);
            let result = self.rng.roll_die(die_seed, sides as u32);
            self.dice.push(DieRoll {
                sides: sides as u32,
                result,
            });
            sum += result as u64;
        }
        Ok(sum as f64)
    }

    fn function(&mut self) -> Result<f64, ()> {
        let name = self.ident()?;
        self.skip_ws();
        self.expect(b'(')?;
        let mut args = vec![self.expr()?];
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    args.push(self.expr()?);
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(()),
            }
        }
        match (name.as_str(), args.as_slice()) {
            ("floor", [x]) => Ok(x.floor()),
            ("ceil", [x]) => Ok(x.ceil()),
            ("min", args) if !args.is_empty() => {
                Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
            }
            ("max", args) if !args.is_empty() => {
                Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            }
            _ => Err(()),
        }
    }

    fn integer(&mut self) -> Result<u64, ()> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(());
        }
        core::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| ())?
            .parse()
            .map_err(|_| ())
    }

    fn ident(&mut self) -> Result<String, ()> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(());
        }
        core::str::from_utf8(&self.input[start..self.pos])
            .map(str::to_owned)
            .map_err(|_| ())
    }

    /// Dotted variable path after `@`, e.g. `abilities.str.mod`.
    fn ident_path(&mut self) -> Result<String, ()> {
        let mut path = self.ident()?;
        while self.peek() == Some(b'.') {
            self.pos += 1;
            path.push('.');
            path.push_str(&self.ident()?);
        }
        Ok(path)
    }

    fn expect(&mut self, c: u8) -> Result<(), ()> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(())
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }
}
