use crate::domain::instruction::Payee;
use crate::error::{PayoutError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum RowPayeeType {
    EmployeePayroll,
    EmployeeEwa,
    Contractor,
}

/// One payout line of a run CSV.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RunRow {
    pub payee_type: RowPayeeType,
    pub payee_id: String,
    pub account: String,
    pub amount_cents: i64,
}

impl RunRow {
    pub fn payee(&self) -> Payee {
        match self.payee_type {
            RowPayeeType::EmployeePayroll => Payee::EmployeePayroll {
                employee_id: self.payee_id.clone(),
            },
            RowPayeeType::EmployeeEwa => Payee::EmployeeEwa {
                employee_id: self.payee_id.clone(),
            },
            RowPayeeType::Contractor => Payee::Contractor {
                contractor_id: self.payee_id.clone(),
            },
        }
    }
}

/// Reads payroll run rows from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<RunRow>` lazily, trimming
/// whitespace, so large runs stream without loading the file into memory.
pub struct RunReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RunReader<R> {
    /// Creates a new `RunReader` from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<RunRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PayoutError::from))
    }
}
