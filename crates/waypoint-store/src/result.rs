// waypoint-store/src/result.rs
// ============================================================================
// Module: Statements and Tabular Results
// Description: Statement descriptors and text-mode result sets.
// Purpose: Describe what the client executes and what it returns.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A [`Statement`] names either a stored procedure in the backend catalog or a
//! literal SQL text, together with the exact number of string parameters it
//! takes. Results come back as a [`ResultSet`]: ordered columns and ordered
//! rows of nullable text cells.

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Statement flavor understood by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Named stored operation resolved by the backend.
    Procedure,
    /// Literal SQL text executed as-is.
    Sql,
}

/// Parameterized statement with a fixed arity.
///
/// # Invariants
/// - `arity` is the exact number of parameters callers must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement {
    /// Statement flavor.
    kind: StatementKind,
    /// Procedure name or SQL text.
    text: &'static str,
    /// Required parameter count.
    arity: usize,
}

impl Statement {
    /// Describes a named stored operation.
    #[must_use]
    pub const fn procedure(name: &'static str, arity: usize) -> Self {
        Self {
            kind: StatementKind::Procedure,
            text: name,
            arity,
        }
    }

    /// Describes a literal SQL statement.
    #[must_use]
    pub const fn sql(text: &'static str, arity: usize) -> Self {
        Self {
            kind: StatementKind::Sql,
            text,
            arity,
        }
    }

    /// Returns the statement flavor.
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Returns the procedure name or SQL text.
    #[must_use]
    pub const fn text(&self) -> &'static str {
        self.text
    }

    /// Returns the required parameter count.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }

    /// Returns a short label for diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self.kind {
            StatementKind::Procedure => self.text,
            StatementKind::Sql => "sql",
        }
    }
}

// ============================================================================
// SECTION: Result Sets
// ============================================================================

/// One result row of nullable text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    /// Cells in column order.
    cells: Vec<Option<String>>,
}

impl Row {
    /// Builds a row from cells in column order.
    #[must_use]
    pub const fn new(cells: Vec<Option<String>>) -> Self {
        Self {
            cells,
        }
    }

    /// Returns the cell at `index`, or `None` for NULL or out-of-range cells.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(Option::as_deref)
    }

    /// Returns the number of cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true when the row has no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Tabular statement result.
///
/// # Invariants
/// - Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Column names in order.
    columns: Vec<String>,
    /// Rows in backend order.
    rows: Vec<Row>,
}

impl ResultSet {
    /// Builds a result set from columns and rows.
    #[must_use]
    pub const fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
        }
    }

    /// Returns an empty result set with no columns.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows in backend order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the position of the named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns the number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no rows were produced.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the first cell of the first row.
    #[must_use]
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first().and_then(|row| row.get(0))
    }
}
