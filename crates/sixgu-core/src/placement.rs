//! Sheet placement and default naming

use std::fmt;

/// Where a sheet-level entity sits on its sheet.
///
/// Rows and columns are 0-based internally, like the A1 names derived from
/// them are 1-based in display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    pub y: u32,
    pub x: u32,
    pub height: u32,
    pub width: u32,
}

impl Placement {
    /// A 1x1 placement at `(y, x)`
    pub fn at(y: u32, x: u32) -> Self {
        Self {
            y,
            x,
            height: 1,
            width: 1,
        }
    }

    /// Same origin, new size
    pub fn resized(self, height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            ..self
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", default_cell_name(self.y, self.x))?;
        if self.height != 1 || self.width != 1 {
            write!(
                f,
                ":{}",
                default_cell_name(self.y + self.height - 1, self.x + self.width - 1)
            )?;
        }
        Ok(())
    }
}

/// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
pub fn column_to_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col as u64 + 1; // 1-based for calculation

    while n > 0 {
        n -= 1;
        let c = ((n % 26) as u8 + b'A') as char;
        result.insert(0, c);
        n /= 26;
    }

    result
}

/// Name given to a cell created at `(y, x)` without an explicit name.
///
/// ```
/// use sixgu_core::default_cell_name;
///
/// assert_eq!(default_cell_name(0, 0), "A1");
/// assert_eq!(default_cell_name(11, 27), "AB12");
/// ```
pub fn default_cell_name(y: u32, x: u32) -> String {
    format!("{}{}", column_to_letters(x), y as u64 + 1)
}
