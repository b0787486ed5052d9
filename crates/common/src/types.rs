//! Fixed-width primitive types for the block lattice.
//!
//! Accounts and block hashes are both 256-bit values but are kept as
//! distinct types; `HashOrAccount` is the deliberately ambiguous form used
//! where the wire format carries either (e.g. a pull request start).

use std::fmt;

macro_rules! bytes32_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0; 32]);

            pub fn zero() -> Self {
                Self::ZERO
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0; 32]
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let array: [u8; 32] = bytes.try_into().ok()?;
                Some(Self(array))
            }

            /// Value with `n` in the low 8 bytes. Handy for deterministic
            /// fixtures and for seeding range cursors.
            pub fn from_low_u64_be(n: u64) -> Self {
                let mut bytes = [0u8; 32];
                bytes[24..].copy_from_slice(&n.to_be_bytes());
                Self(bytes)
            }

            /// The next value in lexical order, or `None` on overflow.
            pub fn checked_increment(&self) -> Option<Self> {
                let mut bytes = self.0;
                for byte in bytes.iter_mut().rev() {
                    let (incremented, overflow) = byte.overflowing_add(1);
                    *byte = incremented;
                    if !overflow {
                        return Some(Self(bytes));
                    }
                }
                None
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        // Abbreviated hex in debug output; the full value is available via Display.
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!(stringify!($name), "({}\u{2026})"),
                    hex::encode(&self.0[..6])
                )
            }
        }
    };
}

bytes32_newtype!(Account);
bytes32_newtype!(BlockHash);
bytes32_newtype!(HashOrAccount);

impl From<Account> for HashOrAccount {
    fn from(account: Account) -> Self {
        Self(account.0)
    }
}

impl From<BlockHash> for HashOrAccount {
    fn from(hash: BlockHash) -> Self {
        Self(hash.0)
    }
}

impl HashOrAccount {
    pub fn as_account(&self) -> Account {
        Account(self.0)
    }

    pub fn as_block_hash(&self) -> BlockHash {
        BlockHash(self.0)
    }
}

impl Account {
    /// Lower bound of the `index`-th of `count` equal partitions of the
    /// account space, i.e. `floor(index * 2^256 / count)`.
    ///
    /// Schoolbook base-256 long division: the dividend's digits are the
    /// big-endian bytes of `index` followed by 32 zero bytes.
    pub fn range_start(index: u64, count: u64) -> Self {
        assert!(count > 0, "partition count must be non-zero");
        assert!(index < count, "partition index out of range");
        let mut quotient = [0u8; 40];
        let mut remainder: u64 = 0;
        let dividend = index.to_be_bytes();
        for (position, digit) in dividend
            .into_iter()
            .chain(std::iter::repeat(0).take(32))
            .enumerate()
        {
            let current = remainder * 256 + digit as u64;
            quotient[position] = (current / count) as u8;
            remainder = current % count;
        }
        // index < count, so the quotient always fits in the last 32 digits
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&quotient[8..]);
        Self(bytes)
    }
}

/// A raw currency amount, in the smallest unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Debug)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u128::MAX);

    pub const fn raw(value: u128) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn to_be_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Detached block signature. Validation belongs to the live verification
/// pipeline; bootstrap and storage treat it as opaque bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}\u{2026})", hex::encode(&self.0[..6]))
    }
}

/// Proof-of-work nonce attached to every block.
pub type WorkNonce = u64;
