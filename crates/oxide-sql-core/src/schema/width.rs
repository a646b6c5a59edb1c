//! Integer storage widths.
//!
//! Bounded integer fields are stored in the narrowest column that holds
//! their whole `[min, max]` range, so a value the setter accepts can never
//! wrap or be truncated by the backend.

/// One of the five integer column widths (8, 16, 24, 32 and 64 bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntWidth {
    /// 8 bit, `TINYINT`.
    Tiny,
    /// 16 bit, `SMALLINT`.
    Small,
    /// 24 bit, `MEDIUMINT`.
    Medium,
    /// 32 bit, `INT`.
    Regular,
    /// 64 bit, `BIGINT`.
    Big,
}

impl IntWidth {
    /// All widths, narrowest first.
    pub const ALL: [Self; 5] = [
        Self::Tiny,
        Self::Small,
        Self::Medium,
        Self::Regular,
        Self::Big,
    ];

    /// Width for a primary key byte budget: 1, 2, 3 and 4 map to their own
    /// width, anything else to `BIGINT`.
    #[must_use]
    pub const fn from_bytes(bytes: u8) -> Self {
        match bytes {
            1 => Self::Tiny,
            2 => Self::Small,
            3 => Self::Medium,
            4 => Self::Regular,
            _ => Self::Big,
        }
    }

    /// Storage size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        match self {
            Self::Tiny => 1,
            Self::Small => 2,
            Self::Medium => 3,
            Self::Regular => 4,
            Self::Big => 8,
        }
    }

    /// The MySQL type keyword.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Tiny => "TINYINT",
            Self::Small => "SMALLINT",
            Self::Medium => "MEDIUMINT",
            Self::Regular => "INT",
            Self::Big => "BIGINT",
        }
    }

    /// Inclusive range of the signed variant.
    #[must_use]
    pub const fn signed_range(self) -> (i64, i64) {
        match self {
            Self::Tiny => (-128, 127),
            Self::Small => (-32_768, 32_767),
            Self::Medium => (-8_388_608, 8_388_607),
            Self::Regular => (-2_147_483_648, 2_147_483_647),
            Self::Big => (i64::MIN, i64::MAX),
        }
    }

    /// Largest value of the unsigned variant.
    #[must_use]
    pub const fn unsigned_max(self) -> u64 {
        match self {
            Self::Tiny => 255,
            Self::Small => 65_535,
            Self::Medium => 16_777_215,
            Self::Regular => 4_294_967_295,
            Self::Big => u64::MAX,
        }
    }
}

/// The column type chosen for an integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerStorage {
    /// Column width.
    pub width: IntWidth,
    /// Whether the column is `UNSIGNED`.
    pub unsigned: bool,
}

impl IntegerStorage {
    /// Narrowest storage holding every value of `[min, max]`.
    ///
    /// Unsigned whenever `min >= 0`.
    #[must_use]
    pub fn for_range(min: i64, max: i64) -> Self {
        if min >= 0 {
            let max = max.unsigned_abs();
            let width = IntWidth::ALL
                .into_iter()
                .find(|w| max <= w.unsigned_max())
                .unwrap_or(IntWidth::Big);
            Self {
                width,
                unsigned: true,
            }
        } else {
            let width = IntWidth::ALL
                .into_iter()
                .find(|w| {
                    let (lo, hi) = w.signed_range();
                    lo <= min && max <= hi
                })
                .unwrap_or(IntWidth::Big);
            Self {
                width,
                unsigned: false,
            }
        }
    }

    /// Unsigned storage of the given width, used for ids and references.
    #[must_use]
    pub const fn id(width: IntWidth) -> Self {
        Self {
            width,
            unsigned: true,
        }
    }

    /// Type fragment such as `MEDIUMINT UNSIGNED`.
    #[must_use]
    pub fn sql(&self) -> String {
        if self.unsigned {
            format!("{} UNSIGNED", self.width.sql_name())
        } else {
            String::from(self.width.sql_name())
        }
    }
}

/// Effective `[min, max]` of an integer field.
///
/// A missing bound takes the `INT` limit on that side: `i32::MIN` below,
/// and above either `u32::MAX` (non-negative ranges) or `i32::MAX`. A
/// declared bound beyond the default is kept.
#[must_use]
pub fn effective_range(min: Option<i64>, max: Option<i64>) -> (i64, i64) {
    let (int_min, int_max) = IntWidth::Regular.signed_range();
    let uint_max = i64::from(u32::MAX);
    let lo = min.unwrap_or_else(|| max.map_or(int_min, |hi| hi.min(int_min)));
    let hi = max.unwrap_or_else(|| {
        let default = if lo >= 0 { uint_max } else { int_max };
        default.max(lo)
    });
    (lo, hi)
}
