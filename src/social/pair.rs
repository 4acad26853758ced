use std::cmp::Ordering;

use uuid::Uuid;

use crate::social::SocialError;

/// An unordered pair of two distinct accounts.
///
/// Both orders of construction result in the same pair, which makes it the only key used to
/// look up connections.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pair {
    low: Uuid,
    high: Uuid,
}

impl Pair {
    /// Create the pair of `a` and `b`.
    ///
    /// Fails with [SocialError::InvalidOperation] if both are the same account.
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, SocialError> {
        match a.cmp(&b) {
            Ordering::Less => Ok(Self { low: a, high: b }),
            Ordering::Greater => Ok(Self { low: b, high: a }),
            Ordering::Equal => Err(SocialError::InvalidOperation),
        }
    }

    /// The lower of both uuids
    pub fn low(&self) -> Uuid {
        self.low
    }

    /// The higher of both uuids
    pub fn high(&self) -> Uuid {
        self.high
    }

    /// The canonical key that is stored in the unique `pair_key` column
    pub fn key(&self) -> String {
        format!("{}:{}", self.low.simple(), self.high.simple())
    }

    /// The member of the pair that is not `uuid`
    pub fn other(&self, uuid: Uuid) -> Option<Uuid> {
        if uuid == self.low {
            Some(self.high)
        } else if uuid == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_of_construction_does_not_matter() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let ab = Pair::new(a, b).unwrap();
        let ba = Pair::new(b, a).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab.key(), ba.key());
        assert!(ab.low() < ab.high());
    }

    #[test]
    fn self_pair_is_rejected() {
        let a = Uuid::new_v4();
        assert!(matches!(Pair::new(a, a), Err(SocialError::InvalidOperation)));
    }

    #[test]
    fn other_member() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let pair = Pair::new(a, b).unwrap();

        assert_eq!(pair.other(a), Some(b));
        assert_eq!(pair.other(b), Some(a));
        assert_eq!(pair.other(Uuid::new_v4()), None);
    }

    #[test]
    fn key_fits_into_column() {
        let pair = Pair::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert_eq!(pair.key().len(), 65);
    }
}
