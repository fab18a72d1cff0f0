use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, Sub};

/// An amount of the tinycoin currency.
/// The representation is signed so that balance arithmetic can go below zero while a
/// transaction's deficit is being detected, even though valid outputs never hold
/// negative amounts.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Tinycoin(i64);

impl Tinycoin {
    pub const fn new(amount: i64) -> Self {
        Tinycoin(amount)
    }

    pub fn zero() -> Self {
        Self::new(0)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Add for Tinycoin {
    type Output = Tinycoin;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Tinycoin {
    type Output = Tinycoin;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum<Tinycoin> for Tinycoin {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let mut sum = Self::zero();
        for el in iter {
            sum = sum.add(el);
        }
        sum
    }
}

impl From<i64> for Tinycoin {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl Display for Tinycoin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} TNC", self.0)
    }
}
