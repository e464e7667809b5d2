use crate::domain::AbundanceMatrix;
use crate::error::DredgeError;
use crate::scheduler::YieldBudget;

use super::lines;

pub async fn parse_abundance_matrix(
    text: &str,
    chunk: usize,
) -> Result<AbundanceMatrix, DredgeError> {
    let mut rows = lines(text);
    let header = rows
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(DredgeError::parse)?;
    let replicates = header
        .split('\t')
        .skip(1)
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut matrix = AbundanceMatrix {
        transcripts: Vec::new(),
        replicates,
        abundances: Vec::new(),
    };
    let mut budget = YieldBudget::new(chunk);

    for row in rows {
        if row.trim().is_empty() {
            continue;
        }
        let mut fields = row.split('\t');
        let transcript = fields.next().unwrap_or_default();
        let mut values = fields.map(parse_float).collect::<Vec<_>>();
        values.resize(matrix.replicates.len(), f64::NAN);

        matrix.transcripts.push(transcript.to_string());
        matrix.abundances.push(values);
        budget.tick().await;
    }

    Ok(matrix)
}

pub fn parse_float(field: &str) -> f64 {
    let field = field.trim();
    if let Ok(value) = field.parse::<f64>() {
        return value;
    }
    let mut prev = None;
    let end = field
        .char_indices()
        .take_while(|&(i, c)| {
            let sign_ok = i == 0 || matches!(prev, Some('e' | 'E'));
            prev = Some(c);
            c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E') || (sign_ok && matches!(c, '-' | '+'))
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    (0..=end)
        .rev()
        .find_map(|len| field.get(..len)?.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn parses_header_and_rows() {
        let text = "gene\tr1\tr2\tr3\nAT1\t1.5\tNA\t3\r\nAT2\t4\n\n";
        let matrix = parse_abundance_matrix(text, 1).await.unwrap();
        assert_eq!(matrix.replicates, vec!["r1", "r2", "r3"]);
        assert_eq!(matrix.transcripts, vec!["AT1", "AT2"]);
        assert_eq!(matrix.abundances[0][0], 1.5);
        assert!(matrix.abundances[0][1].is_nan());
        assert_eq!(matrix.abundances[0][2], 3.0);
        assert_eq!(matrix.abundances[1][0], 4.0);
        assert!(matrix.abundances[1][2].is_nan());
        assert!(matrix.is_consistent());
    }

    #[tokio::test]
    async fn empty_payload_is_a_parse_error() {
        let err = parse_abundance_matrix("", 1000).await.unwrap_err();
        assert_matches!(err, DredgeError::ResourceParse(None));
    }

    #[test]
    fn float_prefixes() {
        assert_eq!(parse_float("2.5"), 2.5);
        assert_eq!(parse_float("-1e3"), -1000.0);
        assert_eq!(parse_float("3.0abc"), 3.0);
        assert_eq!(parse_float("1e-5abc"), 1e-5);
        assert_eq!(parse_float("2E+2x"), 200.0);
        assert_eq!(parse_float("4-3"), 4.0);
        assert!(parse_float("NA").is_nan());
        assert!(parse_float("").is_nan());
    }
}
