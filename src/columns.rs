//! Header lookup for the recipient sheet.
use crate::db::{Sheet, SheetRow};
use crate::model::Recipient;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing column(s) {missing:?} in header [{}]", .header.join(", "))]
pub struct MissingColumns {
    pub missing: Vec<&'static str>,
    pub header: Vec<String>,
}

/// Column indices resolved against a trimmed, lowercased header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub email: usize,
    pub name: usize,
    pub gender: usize,
    pub status: usize,
    pub academic_year: Option<usize>,
}

impl Columns {
    /// Dispatch needs all five columns.
    pub fn for_dispatch(sheet: &Sheet) -> Result<Columns, MissingColumns> {
        Self::locate(sheet, true)
    }

    /// Preview does not archive, so `academic_year` is optional.
    pub fn for_preview(sheet: &Sheet) -> Result<Columns, MissingColumns> {
        Self::locate(sheet, false)
    }

    fn locate(sheet: &Sheet, need_year: bool) -> Result<Columns, MissingColumns> {
        let header = sheet.normalized_header();
        let find = |key: &str| header.iter().position(|h| h == key);

        let email = find("email");
        let name = find("name");
        let gender = find("gender");
        let status = find("status");
        let academic_year = find("academic_year");

        let mut missing = Vec::new();
        for (key, idx) in [
            ("email", email),
            ("name", name),
            ("gender", gender),
            ("status", status),
        ] {
            if idx.is_none() {
                missing.push(key);
            }
        }
        if need_year && academic_year.is_none() {
            missing.push("academic_year");
        }

        match (email, name, gender, status) {
            (Some(email), Some(name), Some(gender), Some(status)) if missing.is_empty() => {
                Ok(Columns {
                    email,
                    name,
                    gender,
                    status,
                    academic_year,
                })
            }
            _ => Err(MissingColumns {
                missing,
                header,
            }),
        }
    }

    pub fn recipient(&self, row: usize, cells: &SheetRow) -> Recipient {
        Recipient {
            row,
            email: cells.cell(self.email).trim().to_string(),
            name: cells.cell(self.name).to_string(),
            gender: cells.cell(self.gender).to_string(),
            academic_year: self
                .academic_year
                .map(|c| cells.cell(c).to_string())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(header: &[&str]) -> Sheet {
        Sheet {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    #[test]
    fn locates_columns_case_insensitively() {
        let s = sheet(&[" Email ", "NAME", "Gender", "status", "Academic_Year", "extra"]);
        let cols = Columns::for_dispatch(&s).unwrap();
        assert_eq!(
            cols,
            Columns {
                email: 0,
                name: 1,
                gender: 2,
                status: 3,
                academic_year: Some(4)
            }
        );
    }

    #[test]
    fn reports_every_missing_column() {
        let s = sheet(&["email", "name", "status"]);
        let err = Columns::for_dispatch(&s).unwrap_err();
        assert_eq!(err.missing, vec!["gender", "academic_year"]);
        assert!(err.to_string().contains("email, name, status"));

        let err = Columns::for_preview(&s).unwrap_err();
        assert_eq!(err.missing, vec!["gender"]);
    }

    #[test]
    fn preview_tolerates_missing_year() {
        let s = sheet(&["email", "name", "gender", "status"]);
        let cols = Columns::for_preview(&s).unwrap();
        assert_eq!(cols.academic_year, None);
        let r = cols.recipient(
            0,
            &SheetRow::new(vec![" a@x.io ".into(), "An".into(), "nam".into()]),
        );
        assert_eq!(r.email, "a@x.io");
        assert_eq!(r.status, "");
        assert_eq!(r.academic_year, "");
    }
}
