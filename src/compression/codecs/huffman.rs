//! Static Huffman nibble codec
//!
//! Each value after the first is XORed with its predecessor and the 64-bit
//! XOR is written as 16 nibbles, most significant first, each replaced by its
//! code from a fixed tree. The tree is trained offline: nibble 0 dominates
//! XOR streams, so it gets a one-bit code.
//!
//! ```text
//! header: count(16)
//! item:   16 nibble codes
//! ```
//!
//! The tree is built once per process and shared read-only by every call.

use super::{check_block, check_count, Codec, CodecId, MAX_ITEMS_16};
use crate::compression::bit_stream::{BitReader, BitWriter};
use crate::error::Result;
use lazy_static::lazy_static;

/// Trained nibble frequencies, indexed by nibble value
const NIBBLE_WEIGHTS: [u64; 16] = [
    4_730_086_893,
    140_062_372,
    142_505_858,
    887_293_580,
    357_317_923,
    276_924_180,
    753_344_560,
    95_991_367,
    78_135_772,
    813_707_073,
    319_745_995,
    67_332_811,
    693_685_469,
    111_126_662,
    79_943_356,
    300_999_249,
];

lazy_static! {
    static ref NIBBLE_TREE: HuffmanTree = HuffmanTree::build(&NIBBLE_WEIGHTS);
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf(u8),
    Internal { left: usize, right: usize },
}

/// Prefix code for one symbol, root bit first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Code {
    /// Code bits, right-aligned
    pub bits: u64,
    /// Code length in bits
    pub len: u8,
}

/// Immutable Huffman tree over 16 symbols
#[derive(Debug)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: usize,
    codes: [Code; 16],
}

impl HuffmanTree {
    /// Build the tree for `weights`
    ///
    /// Symbols are stably sorted by weight; the two lightest nodes are joined
    /// (left = 0, right = 1) and the parent is inserted before the first
    /// remaining node at least as heavy. Equal weights always yield the same
    /// tree.
    pub fn build(weights: &[u64; 16]) -> Self {
        let mut nodes: Vec<Node> = (0..16u8).map(Node::Leaf).collect();
        let mut queue: Vec<(u64, usize)> = weights.iter().copied().zip(0..16).collect();
        queue.sort_by_key(|&(weight, _)| weight);

        while queue.len() > 1 {
            let (lw, left) = queue.remove(0);
            let (rw, right) = queue.remove(0);
            let weight = lw + rw;
            nodes.push(Node::Internal { left, right });
            let at = queue.partition_point(|&(w, _)| w < weight);
            queue.insert(at, (weight, nodes.len() - 1));
        }

        let root = queue[0].1;
        let mut codes = [Code::default(); 16];
        let mut stack = vec![(root, Code::default())];
        while let Some((index, code)) = stack.pop() {
            match nodes[index] {
                Node::Leaf(symbol) => codes[symbol as usize] = code,
                Node::Internal { left, right } => {
                    stack.push((left, Code { bits: code.bits << 1, len: code.len + 1 }));
                    stack.push((right, Code { bits: (code.bits << 1) | 1, len: code.len + 1 }));
                }
            }
        }

        Self { nodes, root, codes }
    }

    /// Code for `symbol` (0..16)
    pub fn code(&self, symbol: u8) -> Code {
        self.codes[(symbol & 0x0F) as usize]
    }

    fn decode_symbol(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let mut index = self.root;
        loop {
            match self.nodes[index] {
                Node::Leaf(symbol) => return Ok(symbol),
                Node::Internal { left, right } => {
                    index = if reader.read_bit()? { right } else { left };
                }
            }
        }
    }
}

/// Static Huffman codec
#[derive(Debug, Clone, Copy, Default)]
pub struct HuffmanCodec;

impl HuffmanCodec {
    /// Create a codec using the shared nibble tree
    pub fn new() -> Self {
        Self
    }

    /// The shared tree
    pub fn tree() -> &'static HuffmanTree {
        &NIBBLE_TREE
    }
}

impl Codec for HuffmanCodec {
    fn id(&self) -> CodecId {
        CodecId::Huffman
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_ITEMS_16)?;
        let tree = Self::tree();

        let mut writer = BitWriter::new(dst);
        writer.write_bits(values.len() as u64, 16);

        let mut prev = values[0] as u64;
        for &v in &values[1..] {
            let xor = prev ^ v as u64;
            for shift in (0..16).rev().map(|n| n * 4) {
                let code = tree.code(((xor >> shift) & 0x0F) as u8);
                writer.write_bits(code.bits, code.len);
            }
            prev = v as u64;
        }
        writer.finish();
        Ok(values[0])
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        let tree = Self::tree();
        let mut reader = BitReader::new(src);
        check_count(reader.read_bits(16)? as usize, count)?;

        let mut prev = first as u64;
        dst.push(first);
        for _ in 1..count {
            let mut xor = 0u64;
            for _ in 0..16 {
                xor = (xor << 4) | tree.decode_symbol(&mut reader)? as u64;
            }
            prev ^= xor;
            dst.push(prev as i64);
        }
        reader.expect_padding_only()
    }
}
