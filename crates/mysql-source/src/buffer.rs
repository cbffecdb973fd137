//! Chunk accounting for one step.
//!
//! Encoded rows are grouped into INSERT statements under the statement
//! template and statements are grouped into a chunk. A statement is closed
//! ("stowed") when adding a row would exceed `max_insert_string_len`; the
//! step ends when adding a row would exceed `maximum_chunk_size`.

/// Outcome of offering one encoded row to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    /// The row is part of the chunk.
    Accepted,
    /// The chunk is full and the step must transfer now. `accepted` says
    /// whether the row made it into the chunk before it was closed.
    Transfer { accepted: bool },
}

/// Room kept for the statement terminator when checking the chunk limit.
const TERMINATOR_ALLOWANCE: usize = 30;

#[derive(Debug, Default)]
pub struct ChunkBuffer {
    maximum_chunk_size: usize,
    max_insert_string_len: usize,
    template: Vec<u8>,
    query: Vec<u8>,
    query_size: usize,
    chunk_len: usize,
    ready: Vec<u8>,
}

impl ChunkBuffer {
    pub fn new(maximum_chunk_size: usize, max_insert_string_len: usize) -> Self {
        Self {
            maximum_chunk_size,
            max_insert_string_len,
            ..Self::default()
        }
    }

    /// Sets the statement template for the rows that follow and starts an
    /// empty statement. An empty template means every row is a standalone
    /// statement.
    pub fn start(&mut self, template: impl Into<Vec<u8>>) {
        self.template = template.into();
        self.query = self.template.clone();
        self.query_size = 0;
    }

    /// Offers one encoded row.
    pub fn admit(&mut self, fragment: &[u8]) -> Admit {
        let pending = self.chunk_len + fragment.len() + self.query.len() + TERMINATOR_ALLOWANCE;
        if pending > self.maximum_chunk_size {
            // A row larger than a whole chunk still has to go somewhere.
            let accepted = self.query == self.template;
            if accepted {
                self.query.extend_from_slice(fragment);
            }
            self.stow();
            return Admit::Transfer { accepted };
        }

        if self.query_size + fragment.len() > self.max_insert_string_len {
            self.stow();
        }
        self.query.extend_from_slice(fragment);
        self.query_size += fragment.len();
        Admit::Accepted
    }

    /// Closes the open statement and moves it to the ready output.
    pub fn stow(&mut self) {
        if self.query != self.template {
            let mut statement = std::mem::take(&mut self.query);
            while statement.last().is_some_and(|b| matches!(b, b'\n' | b',')) {
                statement.pop();
            }
            if statement.ends_with(b";") {
                statement.push(b'\n');
            } else {
                statement.extend_from_slice(b" ;\n");
            }
            self.chunk_len += statement.len();
            self.ready.extend(statement);
        }
        self.query = self.template.clone();
        self.query_size = 0;
    }

    /// Adds raw SQL (headers, footers) straight to the ready output.
    pub fn stow_raw(&mut self, sql: &[u8]) {
        self.chunk_len += sql.len();
        self.ready.extend_from_slice(sql);
    }

    /// Takes the SQL that is ready to be written.
    pub fn take_ready(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.ready)
    }

    /// Bytes stowed during this step.
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    pub fn has_open_statement(&self) -> bool {
        self.query != self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "INSERT INTO `wp_x` ( `a` ) VALUES\n";

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_rows_grouped_into_one_insert() {
        let mut buffer = ChunkBuffer::new(1024, 1024);
        buffer.start(TEMPLATE);
        assert_eq!(buffer.admit(b"(1),\n"), Admit::Accepted);
        assert_eq!(buffer.admit(b"(2),\n"), Admit::Accepted);
        buffer.stow();
        assert_eq!(
            text(buffer.take_ready()),
            "INSERT INTO `wp_x` ( `a` ) VALUES\n(1),\n(2) ;\n"
        );
        assert!(!buffer.has_open_statement());
    }

    #[test]
    fn test_insert_split_on_string_limit() {
        let mut buffer = ChunkBuffer::new(1024, 10);
        buffer.start(TEMPLATE);
        buffer.admit(b"(1),\n");
        buffer.admit(b"(2),\n");
        buffer.admit(b"(3),\n");
        buffer.stow();
        assert_eq!(
            text(buffer.take_ready()),
            "INSERT INTO `wp_x` ( `a` ) VALUES\n(1),\n(2) ;\nINSERT INTO `wp_x` ( `a` ) VALUES\n(3) ;\n"
        );
    }

    #[test]
    fn test_chunk_limit_ends_step() {
        let mut buffer = ChunkBuffer::new(TEMPLATE.len() + 39, 1024);
        buffer.start(TEMPLATE);
        assert_eq!(buffer.admit(b"(1),\n"), Admit::Accepted);
        assert_eq!(buffer.admit(b"(2),\n"), Admit::Transfer { accepted: false });
        let out = text(buffer.take_ready());
        assert_eq!(out, "INSERT INTO `wp_x` ( `a` ) VALUES\n(1) ;\n");
        assert_eq!(buffer.chunk_len(), out.len());
    }

    #[test]
    fn test_oversized_row_goes_alone() {
        let mut buffer = ChunkBuffer::new(50, 1024);
        buffer.start(TEMPLATE);
        let big = format!("('{}'),\n", "x".repeat(100));
        assert_eq!(
            buffer.admit(big.as_bytes()),
            Admit::Transfer { accepted: true }
        );
        let out = text(buffer.take_ready());
        assert!(out.starts_with(TEMPLATE));
        assert!(out.ends_with("') ;\n"));
    }

    #[test]
    fn test_update_statements_without_template() {
        let mut buffer = ChunkBuffer::new(1024, 1024);
        buffer.start("");
        buffer.admit(b"UPDATE `t` SET `a` = \"1\" WHERE `id` = \"1\";\n");
        buffer.stow();
        assert_eq!(
            text(buffer.take_ready()),
            "UPDATE `t` SET `a` = \"1\" WHERE `id` = \"1\";\n"
        );
    }

    #[test]
    fn test_empty_fragments_leave_no_statement() {
        let mut buffer = ChunkBuffer::new(1024, 1024);
        buffer.start(TEMPLATE);
        assert_eq!(buffer.admit(b""), Admit::Accepted);
        buffer.stow();
        assert!(buffer.take_ready().is_empty());
        assert_eq!(buffer.chunk_len(), 0);
    }

    #[test]
    fn test_raw_sql_counts_toward_chunk() {
        let mut buffer = ChunkBuffer::new(1024, 1024);
        buffer.stow_raw(b"DROP TABLE IF EXISTS `wp_x`;\n");
        assert_eq!(buffer.chunk_len(), 29);
        assert_eq!(text(buffer.take_ready()), "DROP TABLE IF EXISTS `wp_x`;\n");
    }
}
