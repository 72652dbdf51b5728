use super::views::PivotMatrix;
use std::io::Write;

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(err) => write!(f, "failed to write report: {}", err),
            ExportError::Csv(err) => write!(f, "failed to encode report as CSV: {}", err),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            ExportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Writes one line per pivot row: `person,item,category,<day>...,total`.
/// Days without an entry are left blank. Per-person and household totals
/// follow the item rows with `TOTAL` in the item column.
pub fn write_csv<W: Write>(matrix: &PivotMatrix, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec![
        "person".to_string(),
        "item".to_string(),
        "category".to_string(),
    ];
    header.extend(matrix.days.iter().map(|day| day.format("%Y-%m-%d").to_string()));
    header.push("total".to_string());
    csv_writer.write_record(&header)?;

    for row in &matrix.rows {
        let mut record = vec![
            row.person_name.clone(),
            row.item_name.clone(),
            row.category.as_str().to_string(),
        ];
        record.extend(
            row.cells
                .iter()
                .map(|cell| cell.map(|points| points.to_string()).unwrap_or_default()),
        );
        record.push(row.total.to_string());
        csv_writer.write_record(&record)?;
    }

    for total in matrix.person_totals.iter().chain(matrix.household_total.iter()) {
        let mut record = vec![total.label.clone(), "TOTAL".to_string(), String::new()];
        record.extend(total.cells.iter().map(i32::to_string));
        record.push(total.total.to_string());
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ItemId, PersonId};
    use crate::report::views::{PivotRow, PivotTotalRow};
    use chrono::NaiveDate;

    fn matrix() -> PivotMatrix {
        let start = NaiveDate::from_ymd_opt(2025, 10, 13).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2025, 10, 14).expect("valid date");
        PivotMatrix {
            start,
            end,
            days: vec![start, end],
            rows: vec![PivotRow {
                person_id: PersonId(1),
                person_name: "Abi".to_string(),
                item_id: ItemId(1),
                item_name: "Sholat Subuh".to_string(),
                category: Category::Obligatory,
                eligible: true,
                cells: vec![Some(20), None],
                total: 20,
            }],
            person_totals: vec![PivotTotalRow::new(
                "Abi".to_string(),
                Some(PersonId(1)),
                vec![20, 0],
            )],
            household_total: Some(PivotTotalRow::new("Household".to_string(), None, vec![20, 0])),
            issues: Vec::new(),
        }
    }

    #[test]
    fn csv_has_one_column_per_day_and_blank_missing_cells() {
        let mut buffer = Vec::new();
        write_csv(&matrix(), &mut buffer).expect("export succeeds");
        let text = String::from_utf8(buffer).expect("utf8 output");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "person,item,category,2025-10-13,2025-10-14,total");
        assert_eq!(lines[1], "Abi,Sholat Subuh,obligatory,20,,20");
        assert_eq!(lines[2], "Abi,TOTAL,,20,0,20");
        assert_eq!(lines[3], "Household,TOTAL,,20,0,20");
        assert_eq!(lines.len(), 4);
    }
}
