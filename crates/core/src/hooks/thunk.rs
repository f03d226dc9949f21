//! Forwarding thunks for proxy vtables
//!
//! Every pass-through slot of every proxy vtable points at one shared thunk per
//! slot index. A thunk swaps the proxy's `this` for the wrapped real object and
//! tail-jumps into the real object's vtable at the same slot:
//!
//! ```text
//! mov rcx, [rcx + REAL_OFFSET]   ; rdi on SysV
//! mov rax, [rcx]
//! jmp qword ptr [rax + slot * 8]
//! ```
//!
//! Arguments, stack and return value pass through untouched, so one thunk
//! serves every signature.

use std::ffi::c_void;
use std::sync::OnceLock;

use iced_x86::{Code, Encoder, Instruction, MemoryOperand, Register};

use super::HookError;

/// Highest slot count of any wrapped interface, rounded up
pub const MAX_SLOTS: usize = 128;

/// Bytes reserved per thunk, padded with INT3
const THUNK_STRIDE: usize = 16;

/// Register carrying `this` for member calls
#[cfg(windows)]
const THIS_REGISTER: Register = Register::RCX;
#[cfg(not(windows))]
const THIS_REGISTER: Register = Register::RDI;

/// Executable block holding one thunk per slot
struct ThunkTable {
    memory: region::Allocation,
    real_offset: usize,
}

// SAFETY: The allocation is written once before publication and only executed afterwards
unsafe impl Send for ThunkTable {}
unsafe impl Sync for ThunkTable {}

static THUNKS: OnceLock<Result<ThunkTable, String>> = OnceLock::new();

/// Encode the thunk for one slot
pub fn encode_thunk(slot: usize, real_offset: usize) -> Result<Vec<u8>, HookError> {
    let encoding = |e: iced_x86::IcedError| HookError::Encoding(e.to_string());
    let displacement = i64::try_from(slot * std::mem::size_of::<usize>())
        .map_err(|_| HookError::Encoding(format!("slot {} out of range", slot)))?;

    let instructions = [
        Instruction::with2(
            Code::Mov_r64_rm64,
            THIS_REGISTER,
            MemoryOperand::with_base_displ(THIS_REGISTER, real_offset as i64),
        )
        .map_err(encoding)?,
        Instruction::with2(
            Code::Mov_r64_rm64,
            Register::RAX,
            MemoryOperand::with_base_displ(THIS_REGISTER, 0),
        )
        .map_err(encoding)?,
        Instruction::with1(
            Code::Jmp_rm64,
            MemoryOperand::with_base_displ(Register::RAX, displacement),
        )
        .map_err(encoding)?,
    ];

    let mut encoder = Encoder::new(64);
    for instruction in &instructions {
        encoder.encode(instruction, 0).map_err(encoding)?;
    }
    let code = encoder.take_buffer();
    if code.len() > THUNK_STRIDE {
        return Err(HookError::Encoding(format!(
            "thunk for slot {} is {} bytes",
            slot,
            code.len()
        )));
    }
    Ok(code)
}

impl ThunkTable {
    fn build(real_offset: usize) -> Result<Self, HookError> {
        let size = MAX_SLOTS * THUNK_STRIDE;
        let mut memory = region::alloc(size, region::Protection::READ_WRITE)
            .map_err(|e| HookError::Allocation(e.to_string()))?;

        let base = memory.as_mut_ptr::<u8>();
        unsafe { std::ptr::write_bytes(base, 0xCC, memory.len()) };

        for slot in 0..MAX_SLOTS {
            let code = encode_thunk(slot, real_offset)?;
            unsafe {
                std::ptr::copy_nonoverlapping(code.as_ptr(), base.add(slot * THUNK_STRIDE), code.len());
            }
        }

        unsafe { region::protect(base, size, region::Protection::READ_EXECUTE) }
            .map_err(|e| HookError::MemoryProtection(e.to_string()))?;

        tracing::debug!("Built {} forwarding thunks at {:p}", MAX_SLOTS, base);
        Ok(Self { memory, real_offset })
    }

    fn entry(&self, slot: usize) -> *const c_void {
        unsafe { self.memory.as_ptr::<u8>().add(slot * THUNK_STRIDE) as *const c_void }
    }
}

/// Address of the forwarding thunk for `slot`
///
/// `real_offset` is the byte offset of the wrapped-object pointer inside the
/// proxy. It is fixed by the first call.
pub fn forwarding_thunk(slot: usize, real_offset: usize) -> Result<*const c_void, HookError> {
    if !cfg!(target_arch = "x86_64") {
        return Err(HookError::Unsupported("forwarding thunks require x86_64"));
    }
    if slot >= MAX_SLOTS {
        return Err(HookError::Encoding(format!("slot {} exceeds {}", slot, MAX_SLOTS)));
    }

    let table = THUNKS
        .get_or_init(|| ThunkTable::build(real_offset).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| HookError::Allocation(e.clone()))?;

    if table.real_offset != real_offset {
        return Err(HookError::Unsupported("thunks built for a different proxy layout"));
    }
    Ok(table.entry(slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use iced_x86::{Decoder, DecoderOptions, Mnemonic};

    #[test]
    fn test_thunk_shape() {
        let code = encode_thunk(47, 8).unwrap();
        let mut decoder = Decoder::new(64, &code, DecoderOptions::NONE);

        let load_real = decoder.decode();
        assert_eq!(load_real.mnemonic(), Mnemonic::Mov);
        assert_eq!(load_real.op0_register(), THIS_REGISTER);
        assert_eq!(load_real.memory_base(), THIS_REGISTER);
        assert_eq!(load_real.memory_displacement64(), 8);

        let load_vtbl = decoder.decode();
        assert_eq!(load_vtbl.op0_register(), Register::RAX);
        assert_eq!(load_vtbl.memory_base(), THIS_REGISTER);

        let jump = decoder.decode();
        assert_eq!(jump.mnemonic(), Mnemonic::Jmp);
        assert_eq!(jump.memory_base(), Register::RAX);
        assert_eq!(jump.memory_displacement64(), 47 * 8);
        assert!(!decoder.can_decode());
    }

    #[test]
    fn test_every_slot_fits_stride() {
        for slot in 0..MAX_SLOTS {
            assert!(encode_thunk(slot, 8).unwrap().len() <= THUNK_STRIDE);
        }
    }

    #[test]
    fn test_out_of_range_slot() {
        assert!(forwarding_thunk(MAX_SLOTS, 8).is_err());
    }
}
