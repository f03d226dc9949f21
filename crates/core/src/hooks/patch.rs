//! Entry point patch encoding and code memory access
//!
//! The redirection is a 12-byte absolute transfer:
//!
//! ```text
//! 48 B8 <imm64>   mov rax, replacement
//! FF E0           jmp rax
//! ```
//!
//! RAX is volatile in both x64 calling conventions, so clobbering it before
//! the replacement runs is invisible to the caller.

use iced_x86::{BlockEncoder, BlockEncoderOptions, Code, Instruction, InstructionBlock, Register};

use super::HookError;

/// Length of the absolute jump written over an entry point
pub const PATCH_LEN: usize = 12;

/// Encode `mov rax, destination; jmp rax`
pub fn encode_absolute_jump(destination: u64) -> Result<[u8; PATCH_LEN], HookError> {
    let instructions = [
        Instruction::with2(Code::Mov_r64_imm64, Register::RAX, destination)
            .map_err(|e| HookError::Encoding(e.to_string()))?,
        Instruction::with1(Code::Jmp_rm64, Register::RAX)
            .map_err(|e| HookError::Encoding(e.to_string()))?,
    ];

    let block = InstructionBlock::new(&instructions, 0);
    let encoded = BlockEncoder::encode(64, block, BlockEncoderOptions::NONE)
        .map_err(|e| HookError::Encoding(e.to_string()))?;

    encoded
        .code_buffer
        .as_slice()
        .try_into()
        .map_err(|_| HookError::Encoding(format!("unexpected patch length {}", encoded.code_buffer.len())))
}

/// Access to the code bytes of the process
///
/// Split out so the hook table can be driven against a fake in tests
/// without patching real machine code.
pub trait CodeMemory: Send + Sync {
    /// Copy `buf.len()` bytes starting at `address`
    ///
    /// # Safety
    /// `address` must be readable for `buf.len()` bytes.
    unsafe fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), HookError>;

    /// Overwrite code at `address` and make it visible to every thread
    ///
    /// # Safety
    /// `address` must be mapped for `bytes.len()` bytes and no thread may be
    /// executing inside the range.
    unsafe fn write(&self, address: usize, bytes: &[u8]) -> Result<(), HookError>;
}

/// The real process image
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl CodeMemory for ProcessMemory {
    unsafe fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), HookError> {
        if address == 0 {
            return Err(HookError::InvalidAddress(address));
        }
        std::ptr::copy_nonoverlapping(address as *const u8, buf.as_mut_ptr(), buf.len());
        Ok(())
    }

    unsafe fn write(&self, address: usize, bytes: &[u8]) -> Result<(), HookError> {
        if address == 0 {
            return Err(HookError::InvalidAddress(address));
        }

        {
            // Previous protection comes back when the handle drops
            let _protection = region::protect_with_handle(
                address as *const u8,
                bytes.len(),
                region::Protection::READ_WRITE_EXECUTE,
            )
            .map_err(|e| HookError::MemoryProtection(e.to_string()))?;

            std::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
        }

        flush_instruction_cache(address, bytes.len());
        Ok(())
    }
}

#[cfg(windows)]
fn flush_instruction_cache(address: usize, len: usize) {
    use windows::Win32::System::Diagnostics::Debug::FlushInstructionCache;
    use windows::Win32::System::Threading::GetCurrentProcess;

    let flushed =
        unsafe { FlushInstructionCache(GetCurrentProcess(), Some(address as *const _), len) };
    if let Err(e) = flushed {
        tracing::warn!("FlushInstructionCache failed at {:x}: {}", address, e);
    }
}

#[cfg(not(windows))]
fn flush_instruction_cache(_address: usize, _len: usize) {
    // x86 keeps instruction fetch coherent with stores
    std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use iced_x86::{Decoder, DecoderOptions, Mnemonic};

    #[test]
    fn test_absolute_jump_bytes() {
        let bytes = encode_absolute_jump(0x1122_3344_5566_7788).unwrap();
        assert_eq!(
            bytes,
            [0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0xFF, 0xE0]
        );
    }

    #[test]
    fn test_absolute_jump_decodes() {
        let bytes = encode_absolute_jump(0xDEAD_BEEF).unwrap();
        let mut decoder = Decoder::new(64, &bytes, DecoderOptions::NONE);

        let mov = decoder.decode();
        assert_eq!(mov.mnemonic(), Mnemonic::Mov);
        assert_eq!(mov.op0_register(), Register::RAX);
        assert_eq!(mov.immediate64(), 0xDEAD_BEEF);

        let jmp = decoder.decode();
        assert_eq!(jmp.mnemonic(), Mnemonic::Jmp);
        assert_eq!(jmp.op0_register(), Register::RAX);
        assert!(!decoder.can_decode());
    }

    #[test]
    fn test_process_memory_patch_and_restore_protection() {
        let mut page = region::alloc(region::page::size(), region::Protection::READ_WRITE).unwrap();
        let base = page.as_mut_ptr::<u8>();
        unsafe { std::ptr::write_bytes(base, 0x90, 32) };
        let address = base as usize;
        let patch = encode_absolute_jump(0x4000).unwrap();

        unsafe {
            ProcessMemory.write(address + 4, &patch).unwrap();
            let mut back = [0u8; PATCH_LEN];
            ProcessMemory.read(address + 4, &mut back).unwrap();
            assert_eq!(back, patch);

            let bytes = std::slice::from_raw_parts(base, 32);
            assert_eq!(bytes[3], 0x90);
            assert_eq!(bytes[15], 0xE0);
            assert_eq!(bytes[16], 0x90);
        }

        let protection = region::query(base).unwrap().protection();
        assert_eq!(protection, region::Protection::READ_WRITE);
    }

    #[test]
    fn test_process_memory_rejects_null() {
        let mut buf = [0u8; 4];
        assert!(matches!(
            unsafe { ProcessMemory.read(0, &mut buf) },
            Err(HookError::InvalidAddress(0))
        ));
    }
}
