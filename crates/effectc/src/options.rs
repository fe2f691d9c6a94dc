//! Declarative option grammar for directive blocks. Each block kind lists its
//! options as an enum implementing `BlockOption` together with the options it
//! cannot be combined with; `OptionSet` then enforces uniqueness, conflicts
//! and presence rules the same way for every block.
use std::marker::PhantomData;

use crate::error::{BlockError, BlockResult};
use crate::scanner::{Blanks, Cursor, Token};

pub(crate) trait BlockOption: Copy + Eq + 'static {
    const ALL: &'static [Self];

    fn keyword(self) -> &'static str;

    /// Options that may not share a block with `self`. Conflicts are checked
    /// in both directions, so listing a pair on one side is enough.
    fn conflicts(self) -> &'static [Self] {
        &[]
    }
}

#[derive(Debug)]
pub(crate) struct OptionSet<K> {
    seen: u32,
    kind: PhantomData<K>,
}

impl<K: BlockOption> OptionSet<K> {
    pub(crate) fn new() -> Self {
        Self {
            seen: 0,
            kind: PhantomData,
        }
    }

    pub(crate) fn contains(&self, option: K) -> bool {
        self.seen & Self::bit(option) != 0
    }

    /// Records `option`, rejecting repeats and conflicting combinations.
    pub(crate) fn insert(&mut self, option: K) -> BlockResult<()> {
        if self.contains(option) {
            return Err(BlockError::syntax(format!(
                "option {} specified more than once",
                option.keyword()
            )));
        }

        let clash = K::ALL.iter().copied().find(|other| {
            self.contains(*other)
                && (option.conflicts().contains(other) || other.conflicts().contains(&option))
        });
        if let Some(other) = clash {
            return Err(BlockError::syntax(format!(
                "option {} conflicts with {}",
                option.keyword(),
                other.keyword()
            )));
        }

        self.seen |= Self::bit(option);
        Ok(())
    }

    pub(crate) fn require(&self, option: K) -> BlockResult<()> {
        if self.contains(option) {
            Ok(())
        } else {
            Err(BlockError::syntax(format!(
                "missing required option {}",
                option.keyword()
            )))
        }
    }

    pub(crate) fn requires(&self, option: K, dependency: K) -> BlockResult<()> {
        if self.contains(option) && !self.contains(dependency) {
            return Err(BlockError::syntax(format!(
                "option {} requires {}",
                option.keyword(),
                dependency.keyword()
            )));
        }
        Ok(())
    }

    pub(crate) fn both_or_neither(&self, a: K, b: K) -> BlockResult<()> {
        if self.contains(a) != self.contains(b) {
            return Err(BlockError::syntax(format!(
                "options {} and {} must be given together",
                a.keyword(),
                b.keyword()
            )));
        }
        Ok(())
    }

    pub(crate) fn exactly_one(&self, a: K, b: K) -> BlockResult<()> {
        if self.contains(a) == self.contains(b) {
            return Err(BlockError::syntax(format!(
                "exactly one of {} or {} is required",
                a.keyword(),
                b.keyword()
            )));
        }
        Ok(())
    }

    fn bit(option: K) -> u32 {
        let index = K::ALL
            .iter()
            .position(|candidate| *candidate == option)
            .unwrap_or(0);
        1 << index
    }
}

/// Reads the keyword following a directive marker and maps it to an option.
pub(crate) fn next_option<K: BlockOption>(cursor: &mut Cursor<'_>) -> BlockResult<K> {
    match cursor.identifier(Blanks::Inline) {
        Token::Ident(token) => {
            let upper = token.to_ascii_uppercase();
            K::ALL
                .iter()
                .copied()
                .find(|option| option.keyword() == upper)
                .ok_or_else(|| BlockError::syntax(format!("unknown option '{token}'")))
        }
        _ => Err(BlockError::syntax("expected an option keyword after //!")),
    }
}
