//! JSON Lines transaction input and JSON output

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use walletlens_core::Transaction;

use crate::error::{CliError, CliResult};

/// Read one transaction per line from `path` ('-' for stdin). Blank lines are skipped.
pub fn read_transactions(path: &Path) -> CliResult<Vec<Transaction>> {
    let io_err = |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    };

    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(path).map_err(io_err)?))
    };

    parse_lines(reader).map_err(|e| match e {
        CliError::Io { source, .. } => io_err(source),
        other => other,
    })
}

fn parse_lines<R: BufRead>(reader: R) -> CliResult<Vec<Transaction>> {
    let mut transactions = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| CliError::Io {
            path: Default::default(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tx: Transaction = serde_json::from_str(trimmed).map_err(|e| CliError::Input {
            line: idx + 1,
            message: e.to_string(),
        })?;
        transactions.push(tx);
    }

    tracing::info!(transactions = transactions.len(), "Loaded transactions");
    Ok(transactions)
}

/// Pretty-print `value` as JSON to `path`, or stdout when `None`
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|source| CliError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush().map_err(|source| CliError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value)?;
            writeln!(handle).map_err(|source| CliError::Io {
                path: "<stdout>".into(),
                source,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletlens_core::TransactionKind;

    const LINE: &str = r#"{"tx_hash":"0x1","wallet":"0xabc","kind":"swap","pair":{"token0":"WETH","token1":"USDC"},"token0_delta":"0.5","token1_delta":"-1000","amount_usd":"1000","timestamp":"2022-05-12T08:00:00Z","gas_fee":"3.2"}"#;

    #[test]
    fn test_reads_file_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}\n\n{}", LINE, LINE.replace("0x1", "0x2")).unwrap();

        let txs = read_transactions(file.path()).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].kind, TransactionKind::Swap);
        assert_eq!(txs[1].tx_hash, "0x2");
        assert_eq!(txs[0].gas_fee.to_string(), "3.2");
    }

    #[test]
    fn test_reports_bad_line_number() {
        let input = format!("{}\nnot json\n", LINE);
        match parse_lines(input.as_bytes()) {
            Err(CliError::Input { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected input error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = read_transactions(Path::new("/nonexistent/walletlens.jsonl")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_write_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&vec![1, 2, 3], Some(&path)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<i32> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
    }
}
