use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::ConvertError;

pub const DEFAULT_SHEET_NAME: &str = "All_Data";

/// Number of vertical boundaries in a statement template; six boundaries
/// delimit the five statement columns.
pub const BOUNDARY_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl PageSelection {
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }
}

impl FromStr for PageSelection {
    type Err = ConvertError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = ConvertError::InvalidPageSelection;
        let mut pages = BTreeSet::new();
        for token in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("invalid page range start: '{start}'")))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("invalid page range end: '{end}'")))?;
                if start == 0 || end == 0 {
                    return Err(invalid("pages are 1-based".to_string()));
                }
                if end < start {
                    return Err(invalid(format!(
                        "invalid range '{token}': end is smaller than start"
                    )));
                }
                pages.extend(start..=end);
            } else {
                let page: u32 = token
                    .parse()
                    .map_err(|_| invalid(format!("invalid page number: '{token}'")))?;
                if page == 0 {
                    return Err(invalid("pages are 1-based".to_string()));
                }
                pages.insert(page);
            }
        }

        if pages.is_empty() {
            return Err(invalid("page selection cannot be empty".to_string()));
        }

        Ok(Self { pages })
    }
}

/// Fixed layout of one statement format: where the column rules sit on the
/// page and how loosely text is matched against them. All values are in PDF
/// user-space units.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementTemplate {
    pub boundaries: [f32; BOUNDARY_COUNT],
    pub text_tolerance: f32,
    pub intersection_x_tolerance: f32,
    pub text_y_tolerance: f32,
}

impl StatementTemplate {
    /// Rejects boundaries that are not strictly increasing and negative or
    /// non-finite tolerances.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.boundaries.iter().any(|value| !value.is_finite()) {
            return Err(ConvertError::InvalidTemplate(
                "column boundaries must be finite numbers".to_string(),
            ));
        }
        if self.boundaries.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(ConvertError::InvalidTemplate(format!(
                "column boundaries must be strictly increasing: {:?}",
                self.boundaries
            )));
        }

        for (name, value) in [
            ("text_tolerance", self.text_tolerance),
            ("intersection_x_tolerance", self.intersection_x_tolerance),
            ("text_y_tolerance", self.text_y_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConvertError::InvalidTemplate(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        Ok(())
    }

    /// Index of the column a fragment starting at `x` belongs to, or `None`
    /// when it lies outside the template window.
    #[must_use]
    pub fn column_for(&self, x: f32) -> Option<usize> {
        let first = self.boundaries[0];
        let last = self.boundaries[BOUNDARY_COUNT - 1];
        if x < first - self.intersection_x_tolerance || x >= last + self.intersection_x_tolerance {
            return None;
        }

        let shifted = x + self.text_tolerance;
        let column = self.boundaries[1..BOUNDARY_COUNT - 1]
            .iter()
            .take_while(|boundary| shifted >= **boundary)
            .count();
        Some(column)
    }
}

impl Default for StatementTemplate {
    fn default() -> Self {
        Self {
            boundaries: [60.0, 125.0, 270.0, 345.0, 450.0, 555.0],
            text_tolerance: 3.0,
            intersection_x_tolerance: 50.0,
            text_y_tolerance: 5.0,
        }
    }
}

impl FromStr for StatementTemplate {
    type Err = ConvertError;

    /// Parses the six column boundaries, `x0,x1,x2,x3,x4,x5`; tolerances
    /// keep their defaults.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let parts = spec.split(',').map(str::trim).collect::<Vec<_>>();
        if parts.len() != BOUNDARY_COUNT {
            return Err(ConvertError::InvalidTemplate(format!(
                "expected exactly {BOUNDARY_COUNT} column boundaries, got {}",
                parts.len()
            )));
        }

        let mut boundaries = [0.0_f32; BOUNDARY_COUNT];
        for (slot, part) in boundaries.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                ConvertError::InvalidTemplate(format!("invalid boundary coordinate: '{part}'"))
            })?;
        }

        let template = Self {
            boundaries,
            ..Self::default()
        };
        template.validate()?;
        Ok(template)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub template: StatementTemplate,
    pub pages: Option<PageSelection>,
    pub sheet_name: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            template: StatementTemplate::default(),
            pages: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}
