//! Point-in-time assertions with labeled failure reporting.
//!
//! Every check is evaluated where it is called and either hands the [`Verify`] back
//! for chaining or returns a [`VerificationFailure`]. Nothing here retries; values that
//! are still converging should come from a [`Poller`](crate::poller::Poller) first.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Kind of comparison that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    DiffersFrom,
    OneOf,
    Contains,
    ContainsItem,
    Within,
    Truth,
    Presence,
    Absence,
    Predicate,
    Converges,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Comparison::Equals => "equals",
            Comparison::DiffersFrom => "differs from",
            Comparison::OneOf => "is one of",
            Comparison::Contains => "contains",
            Comparison::ContainsItem => "contains item",
            Comparison::Within => "is within",
            Comparison::Truth => "truth",
            Comparison::Presence => "is present",
            Comparison::Absence => "is absent",
            Comparison::Predicate => "satisfies",
            Comparison::Converges => "converges",
        };
        f.write_str(name)
    }
}

/// A failed expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailure {
    pub label: Option<String>,
    pub comparison: Comparison,
    pub expected: String,
    pub actual: String,
    /// Attempts made by the poll that produced the actual value, if any.
    pub attempts: Option<u32>,
    pub succinct: bool,
}

impl VerificationFailure {
    pub fn new(
        label: Option<String>,
        comparison: Comparison,
        expected: String,
        actual: String,
    ) -> Self {
        Self {
            label,
            comparison,
            expected,
            actual,
            attempts: None,
            succinct: false,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succinct {
            if let Some(label) = &self.label {
                write!(f, "{label}: ")?;
            }
            write!(f, "expected {}, got {}", self.expected, self.actual)?;
            if let Some(attempts) = self.attempts {
                write!(f, " after {attempts} attempt(s)")?;
            }
            return Ok(());
        }

        match &self.label {
            Some(label) => writeln!(f, "Verification failed: {label}")?,
            None => writeln!(f, "Verification failed")?,
        }
        writeln!(f, "  check:    {}", self.comparison)?;
        writeln!(f, "  expected: {}", self.expected)?;
        write!(f, "  actual:   {}", self.actual)?;
        if let Some(attempts) = self.attempts {
            write!(f, "\n  attempts: {attempts}")?;
        }
        Ok(())
    }
}

impl std::error::Error for VerificationFailure {}

/// Distance between two values, used by [`Verify::is_within`].
pub trait Closeness {
    type Delta: PartialOrd + fmt::Debug;

    fn distance(&self, other: &Self) -> Self::Delta;
}

macro_rules! impl_closeness_int {
    ($($ty:ty => $delta:ty),* $(,)?) => {
        $(
            impl Closeness for $ty {
                type Delta = $delta;

                fn distance(&self, other: &Self) -> $delta {
                    self.abs_diff(*other)
                }
            }
        )*
    };
}

impl_closeness_int!(
    i32 => u32,
    i64 => u64,
    u16 => u16,
    u32 => u32,
    u64 => u64,
    usize => usize,
);

impl Closeness for f32 {
    type Delta = f32;

    fn distance(&self, other: &Self) -> f32 {
        (self - other).abs()
    }
}

impl Closeness for f64 {
    type Delta = f64;

    fn distance(&self, other: &Self) -> f64 {
        (self - other).abs()
    }
}

impl Closeness for Duration {
    type Delta = Duration;

    fn distance(&self, other: &Self) -> Duration {
        if self > other {
            *self - *other
        } else {
            *other - *self
        }
    }
}

impl Closeness for DateTime<Utc> {
    type Delta = chrono::Duration;

    fn distance(&self, other: &Self) -> chrono::Duration {
        let delta = *self - *other;
        if delta < chrono::Duration::zero() {
            -delta
        } else {
            delta
        }
    }
}

impl<T: Closeness + ?Sized> Closeness for &T {
    type Delta = T::Delta;

    fn distance(&self, other: &Self) -> T::Delta {
        (**self).distance(*other)
    }
}

/// Fluent wrapper around an observed value.
#[derive(Debug, Clone)]
pub struct Verify<T> {
    actual: T,
    label: Option<String>,
    succinct: bool,
    attempts: Option<u32>,
}

pub fn verify<T>(actual: T) -> Verify<T> {
    Verify::new(actual)
}

pub fn verify_labeled<T>(actual: T, label: &str) -> Verify<T> {
    Verify::new(actual).labeled(label)
}

/// Truth check on a plain condition.
pub fn verify_that(condition: bool, label: &str) -> Result<(), VerificationFailure> {
    verify_labeled(condition, label).is_true().map(|_| ())
}

impl<T> Verify<T> {
    pub fn new(actual: T) -> Self {
        Self {
            actual,
            label: None,
            succinct: false,
            attempts: None,
        }
    }

    pub fn labeled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Report failures on a single line.
    pub fn succinctly(mut self) -> Self {
        self.succinct = true;
        self
    }

    pub fn after_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn actual(&self) -> &T {
        &self.actual
    }

    pub fn into_inner(self) -> T {
        self.actual
    }

    fn failure(&self, comparison: Comparison, expected: String, actual: String) -> VerificationFailure {
        VerificationFailure {
            label: self.label.clone(),
            comparison,
            expected,
            actual,
            attempts: self.attempts,
            succinct: self.succinct,
        }
    }

    fn rewrap<U>(&self, actual: U) -> Verify<U> {
        Verify {
            actual,
            label: self.label.clone(),
            succinct: self.succinct,
            attempts: self.attempts,
        }
    }
}

impl<T: fmt::Debug> Verify<T> {
    fn check(
        self,
        passed: bool,
        comparison: Comparison,
        expected: impl FnOnce() -> String,
    ) -> Result<Self, VerificationFailure> {
        if passed {
            return Ok(self);
        }
        let actual = format!("{:?}", self.actual);
        Err(self.failure(comparison, expected(), actual))
    }

    pub fn is<E: fmt::Debug>(self, expected: E) -> Result<Self, VerificationFailure>
    where
        T: PartialEq<E>,
    {
        let passed = self.actual == expected;
        self.check(passed, Comparison::Equals, || format!("{expected:?}"))
    }

    pub fn is_not<E: fmt::Debug>(self, unexpected: E) -> Result<Self, VerificationFailure>
    where
        T: PartialEq<E>,
    {
        let passed = self.actual != unexpected;
        self.check(passed, Comparison::DiffersFrom, || {
            format!("anything but {unexpected:?}")
        })
    }

    /// Set membership: the actual value equals one of `options`.
    pub fn is_one_of<E: fmt::Debug>(self, options: &[E]) -> Result<Self, VerificationFailure>
    where
        T: PartialEq<E>,
    {
        let passed = options.iter().any(|option| self.actual == *option);
        self.check(passed, Comparison::OneOf, || format!("one of {options:?}"))
    }

    /// Collection membership.
    pub fn contains_item<I>(self, item: &I) -> Result<Self, VerificationFailure>
    where
        T: AsRef<[I]>,
        I: PartialEq + fmt::Debug,
    {
        let passed = self.actual.as_ref().contains(item);
        self.check(passed, Comparison::ContainsItem, || {
            format!("collection containing {item:?}")
        })
    }

    pub fn satisfies(
        self,
        description: &str,
        predicate: impl FnOnce(&T) -> bool,
    ) -> Result<Self, VerificationFailure> {
        let passed = predicate(&self.actual);
        self.check(passed, Comparison::Predicate, || description.to_string())
    }

    /// Closeness within a tolerance window, inclusive.
    pub fn is_within<D>(self, expected: T, tolerance: D) -> Result<Self, VerificationFailure>
    where
        T: Closeness<Delta = D>,
        D: PartialOrd + fmt::Debug,
    {
        let passed = self.actual.distance(&expected) <= tolerance;
        self.check(passed, Comparison::Within, || {
            format!("{expected:?} ± {tolerance:?}")
        })
    }
}

impl<T: AsRef<str> + fmt::Debug> Verify<T> {
    /// Substring check.
    pub fn contains(self, needle: &str) -> Result<Self, VerificationFailure> {
        let passed = self.actual.as_ref().contains(needle);
        self.check(passed, Comparison::Contains, || format!("text containing {needle:?}"))
    }
}

impl Verify<bool> {
    pub fn is_true(self) -> Result<Self, VerificationFailure> {
        let passed = self.actual;
        self.check(passed, Comparison::Truth, || "true".to_string())
    }

    pub fn is_false(self) -> Result<Self, VerificationFailure> {
        let passed = !self.actual;
        self.check(passed, Comparison::Truth, || "false".to_string())
    }
}

impl<U: fmt::Debug> Verify<Option<U>> {
    /// Presence check; continues with the contained value.
    pub fn is_some(self) -> Result<Verify<U>, VerificationFailure> {
        let Verify {
            actual,
            label,
            succinct,
            attempts,
        } = self;
        match actual {
            Some(value) => Ok(Verify {
                actual: value,
                label,
                succinct,
                attempts,
            }),
            None => Err(VerificationFailure {
                label,
                comparison: Comparison::Presence,
                expected: "some value".to_string(),
                actual: "None".to_string(),
                attempts,
                succinct,
            }),
        }
    }

    pub fn is_none(self) -> Result<Self, VerificationFailure> {
        let passed = self.actual.is_none();
        self.check(passed, Comparison::Absence, || "None".to_string())
    }
}

impl Verify<DateTime<Utc>> {
    /// The timestamp lies within `tolerance` of the current time.
    pub fn is_within_of_now(self, tolerance: chrono::Duration) -> Result<Self, VerificationFailure> {
        let now = Utc::now();
        let passed = self.actual.distance(&now) <= tolerance;
        self.check(passed, Comparison::Within, || {
            format!("now ({now}) ± {tolerance}")
        })
    }
}

impl<T: fmt::Debug> Verify<&T> {
    /// Continue with an owned copy of a borrowed value.
    pub fn cloned(self) -> Verify<T>
    where
        T: Clone,
    {
        self.rewrap(self.actual.clone())
    }
}
