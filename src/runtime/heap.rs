use super::{abi::RawValue, value::Value};

const WORD: usize = std::mem::size_of::<u64>();

/// Arena backing the `allocate` symbol for one program run.
///
/// Blocks are word-aligned and zeroed. Nothing is released individually; the
/// whole arena goes away when the run that owns it finishes.
#[derive(Debug, Default)]
pub struct Heap {
    blocks: Vec<Box<[u64]>>,
    bytes: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocation failure aborts the process through the global allocator.
    pub fn allocate(&mut self, size: u64) -> *mut u8 {
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let words = size.div_ceil(WORD).max(1);
        let mut block = vec![0u64; words].into_boxed_slice();
        let ptr = block.as_mut_ptr().cast::<u8>();
        self.bytes += words * WORD;
        self.blocks.push(block);
        ptr
    }

    /// Lay a host value out exactly as generated code would.
    pub fn store(&mut self, value: &Value) -> RawValue {
        let payload = match value {
            Value::Null => return RawValue::null(),
            Value::Int(v) => {
                let ptr = self.allocate(std::mem::size_of::<i64>() as u64);
                unsafe { ptr.cast::<i64>().write(*v) };
                ptr
            }
            Value::Float(v) => {
                let ptr = self.allocate(std::mem::size_of::<f64>() as u64);
                unsafe { ptr.cast::<f64>().write(*v) };
                ptr
            }
            Value::String(text) => {
                let points: Vec<u32> = text.chars().map(u32::from).chain([0]).collect();
                let ptr = self.allocate((points.len() * std::mem::size_of::<u32>()) as u64);
                unsafe {
                    std::ptr::copy_nonoverlapping(points.as_ptr(), ptr.cast::<u32>(), points.len())
                };
                ptr
            }
        };
        RawValue {
            tag: value.tag().as_u8(),
            payload,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes
    }
}
