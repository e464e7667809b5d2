use csv::ReaderBuilder;

use crate::domain::{Grid, Treatments};
use crate::error::DredgeError;

pub fn parse_grid(text: &str, treatments: &Treatments) -> Result<Grid, DredgeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|_| DredgeError::parse())?;
        let row = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    return Ok(None);
                }
                if !treatments.contains_key(cell) {
                    return Err(DredgeError::parse_reason(format!(
                        "Treatment {cell} not in project"
                    )));
                }
                Ok(Some(cell.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        grid.push(row);
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_treatments;

    fn treatments() -> Treatments {
        parse_treatments(r#"{"root":{"replicates":["r1"]},"leaf":{"replicates":["l1"]}}"#).unwrap()
    }

    #[test]
    fn empty_cells_become_gaps() {
        let grid = parse_grid("root,,leaf\n,leaf\n", &treatments()).unwrap();
        assert_eq!(
            grid,
            vec![
                vec![Some("root".to_string()), None, Some("leaf".to_string())],
                vec![None, Some("leaf".to_string())],
            ]
        );
    }

    #[test]
    fn unknown_treatment_is_named() {
        let err = parse_grid("root,stem\n", &treatments()).unwrap_err();
        assert_eq!(err.to_string(), "Error parsing file: Treatment stem not in project");
    }
}
