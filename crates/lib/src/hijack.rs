//! Address ranges owned by patches, and the ownership-transition check.
//!
//! A patch that is reinserted must keep writing every address it wrote before.
//! If it stops covering an address, the bytes it left there in the ROM can no
//! longer be attributed to anything and only a full build restores them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Range `[address, address + length)` written into the original ROM area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Hijack {
  pub address: u32,
  pub length: u32,
}

impl Hijack {
  pub fn new(address: u32, length: u32) -> Self {
    Self { address, length }
  }

  pub fn end(&self) -> u64 {
    u64::from(self.address) + u64::from(self.length)
  }

  pub fn is_empty(&self) -> bool {
    self.length == 0
  }
}

impl From<(u32, u32)> for Hijack {
  fn from((address, length): (u32, u32)) -> Self {
    Self { address, length }
  }
}

impl From<Hijack> for (u32, u32) {
  fn from(hijack: Hijack) -> Self {
    (hijack.address, hijack.length)
  }
}

impl fmt::Display for Hijack {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "${:06X}..${:06X}", self.address, self.end())
  }
}

/// Result of comparing the hijacks of a patch before and after reinsertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HijackCheck {
  Safe,
  /// `address` was covered before and is not covered anymore.
  Uncovered { address: u64 },
}

impl HijackCheck {
  pub fn is_safe(&self) -> bool {
    matches!(self, HijackCheck::Safe)
  }
}

/// Check that every address covered by `old` is still covered by `new`.
pub fn check_hijacks(old: &[Hijack], new: &[Hijack]) -> HijackCheck {
  let old = coalesce(old);
  let new = coalesce(new);

  let mut covering = new.iter().peekable();
  for &(start, end) in &old {
    let mut cursor = start;
    while cursor < end {
      while covering.next_if(|&&(_, e)| e <= cursor).is_some() {}
      match covering.peek() {
        Some(&&(s, e)) if s <= cursor => cursor = e.min(end),
        _ => return HijackCheck::Uncovered { address: cursor },
      }
    }
  }

  HijackCheck::Safe
}

/// Sorted, merged `[start, end)` intervals. Empty ranges are dropped.
fn coalesce(hijacks: &[Hijack]) -> Vec<(u64, u64)> {
  let mut ranges: Vec<(u64, u64)> = hijacks
    .iter()
    .filter(|h| !h.is_empty())
    .map(|h| (u64::from(h.address), h.end()))
    .collect();
  ranges.sort_unstable();

  let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
  for (start, end) in ranges {
    match merged.last_mut() {
      Some(last) if start <= last.1 => last.1 = last.1.max(end),
      _ => merged.push((start, end)),
    }
  }
  merged
}

/// Overlap between the ranges of two different writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
  pub start: u64,
  pub length: u64,
}

/// Every pairwise overlap between `a` and `b`.
pub fn overlaps(a: &[Hijack], b: &[Hijack]) -> Vec<Overlap> {
  let mut found = Vec::new();
  for x in a.iter().filter(|h| !h.is_empty()) {
    for y in b.iter().filter(|h| !h.is_empty()) {
      let start = u64::from(x.address).max(u64::from(y.address));
      let end = x.end().min(y.end());
      if start < end {
        found.push(Overlap {
          start,
          length: end - start,
        });
      }
    }
  }
  found
}
