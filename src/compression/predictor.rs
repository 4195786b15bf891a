//! Finite-context value predictors used by FPC and PDFCM
//!
//! Each predictor owns a fixed table of `1 << table_bits` slots indexed by a
//! rolling hash of recent history. Tables start zeroed, so an encoder and a
//! decoder fed the same sequence of `update` calls produce identical
//! predictions. Predictor state belongs to a single compress or decompress
//! call and is never shared.

/// Table size used by the FPC and PDFCM codecs
pub const DEFAULT_TABLE_BITS: u32 = 12;

/// Smallest accepted table size
pub const MIN_TABLE_BITS: u32 = 1;

/// Largest accepted table size (16M slots)
pub const MAX_TABLE_BITS: u32 = 24;

/// Clamp a requested table size into `MIN_TABLE_BITS..=MAX_TABLE_BITS`
pub fn clamp_table_bits(table_bits: u32) -> u32 {
    table_bits.clamp(MIN_TABLE_BITS, MAX_TABLE_BITS)
}

fn zeroed_table(table_bits: u32) -> Box<[u64]> {
    vec![0u64; 1usize << clamp_table_bits(table_bits)].into_boxed_slice()
}

/// Order-1 finite context model: predicts the value that followed the
/// current context last time
pub struct FcmPredictor {
    table: Box<[u64]>,
    mask: usize,
    hash: usize,
}

impl FcmPredictor {
    /// Create a predictor with `1 << table_bits` slots
    pub fn new(table_bits: u32) -> Self {
        let table = zeroed_table(table_bits);
        let mask = table.len() - 1;
        Self {
            table,
            mask,
            hash: 0,
        }
    }

    /// Predicted next value
    #[inline]
    pub fn predict_next(&self) -> u64 {
        self.table[self.hash]
    }

    /// Record the true value
    #[inline]
    pub fn update(&mut self, actual: u64) {
        self.table[self.hash] = actual;
        self.hash = ((self.hash << 6) ^ (actual >> 48) as usize) & self.mask;
    }
}

/// Differential finite context model: predicts `last + stride`, where the
/// stride is the one that followed the current stride context last time
pub struct DfcmPredictor {
    table: Box<[u64]>,
    mask: usize,
    hash: usize,
    last: u64,
}

impl DfcmPredictor {
    /// Create a predictor with `1 << table_bits` slots
    pub fn new(table_bits: u32) -> Self {
        let table = zeroed_table(table_bits);
        let mask = table.len() - 1;
        Self {
            table,
            mask,
            hash: 0,
            last: 0,
        }
    }

    /// Predicted next value
    #[inline]
    pub fn predict_next(&self) -> u64 {
        self.table[self.hash].wrapping_add(self.last)
    }

    /// Record the true value
    #[inline]
    pub fn update(&mut self, actual: u64) {
        let stride = actual.wrapping_sub(self.last);
        self.table[self.hash] = stride;
        self.hash = ((self.hash << 2) ^ (stride >> 40) as usize) & self.mask;
        self.last = actual;
    }
}

/// XOR-differential finite context model: predicts `last ^ diff`, where the
/// diff is the bit-flip pattern that followed the current context last time
pub struct PdfcmPredictor {
    table: Box<[u64]>,
    mask: usize,
    hash: usize,
    last: u64,
}

impl PdfcmPredictor {
    /// Create a predictor with `1 << table_bits` slots
    pub fn new(table_bits: u32) -> Self {
        let table = zeroed_table(table_bits);
        let mask = table.len() - 1;
        Self {
            table,
            mask,
            hash: 0,
            last: 0,
        }
    }

    /// Predicted next value
    #[inline]
    pub fn predict_next(&self) -> u64 {
        self.table[self.hash] ^ self.last
    }

    /// Record the true value
    #[inline]
    pub fn update(&mut self, actual: u64) {
        let diff = actual ^ self.last;
        self.table[self.hash] = diff;
        self.hash = ((self.hash << 5) ^ (diff >> 50) as usize ^ (diff as usize & 0x1F)) & self.mask;
        self.last = actual;
    }
}
