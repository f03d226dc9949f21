//! Inline entry point hooks
//!
//! Each hook overwrites the first [`PATCH_LEN`] bytes of an exported function
//! with an absolute jump to a local replacement. There is no trampoline: a
//! replacement reaches the real implementation by removing its own patch,
//! calling through, and patching again (see [`HookTable::suspend`]).

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use super::patch::{encode_absolute_jump, CodeMemory, ProcessMemory, PATCH_LEN};

new_key_type! {
    /// Handle for an inline hook
    pub struct InlineHookKey;
}

/// Error type for hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Hook not found")]
    NotFound,

    #[error("Memory protection failed: {0}")]
    MemoryProtection(String),

    #[error("Invalid address: {0:x}")]
    InvalidAddress(usize),

    #[error("Instruction encoding failed: {0}")]
    Encoding(String),

    #[error("Executable memory allocation failed: {0}")]
    Allocation(String),

    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
}

/// State of one patched entry point
#[derive(Debug, Clone)]
pub struct HookRecord {
    name: &'static str,
    target: usize,
    replacement: usize,
    saved: [u8; PATCH_LEN],
    patch_len: usize,
    installed: bool,
}

impl HookRecord {
    pub fn new(name: &'static str, target: usize, replacement: usize) -> Result<Self, HookError> {
        if target == 0 {
            return Err(HookError::InvalidAddress(target));
        }
        if replacement == 0 {
            return Err(HookError::InvalidAddress(replacement));
        }
        Ok(Self {
            name,
            target,
            replacement,
            saved: [0; PATCH_LEN],
            patch_len: 0,
            installed: false,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn replacement(&self) -> usize {
        self.replacement
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Original bytes currently displaced by the patch
    pub fn saved_bytes(&self) -> &[u8] {
        &self.saved[..self.patch_len]
    }

    unsafe fn install(&mut self, memory: &impl CodeMemory) -> Result<(), HookError> {
        if self.installed {
            return Ok(());
        }

        let patch = encode_absolute_jump(self.replacement as u64)?;
        let mut original = [0u8; PATCH_LEN];
        memory.read(self.target, &mut original)?;
        memory.write(self.target, &patch)?;

        self.saved = original;
        self.patch_len = patch.len();
        self.installed = true;
        Ok(())
    }

    unsafe fn remove(&mut self, memory: &impl CodeMemory) -> Result<(), HookError> {
        if !self.installed {
            return Ok(());
        }

        memory.write(self.target, &self.saved[..self.patch_len])?;
        self.patch_len = 0;
        self.installed = false;
        Ok(())
    }
}

/// Registry of entry point hooks over some code memory
pub struct HookTable<M: CodeMemory = ProcessMemory> {
    memory: M,
    hooks: RwLock<SlotMap<InlineHookKey, HookRecord>>,
}

impl<M: CodeMemory> HookTable<M> {
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            hooks: RwLock::new(SlotMap::with_key()),
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Register a hook without patching anything yet
    pub fn register(
        &self,
        name: &'static str,
        target: usize,
        replacement: usize,
    ) -> Result<InlineHookKey, HookError> {
        let record = HookRecord::new(name, target, replacement)?;
        tracing::debug!(
            "Registered inline hook '{}' at {:x} -> {:x}",
            name,
            target,
            replacement
        );
        Ok(self.hooks.write().insert(record))
    }

    /// Patch one entry point. Installing an installed hook is a no-op.
    pub fn install(&self, key: InlineHookKey) -> Result<(), HookError> {
        let mut hooks = self.hooks.write();
        let record = hooks.get_mut(key).ok_or(HookError::NotFound)?;
        unsafe { record.install(&self.memory) }
    }

    /// Restore one entry point. Removing a hook that is not installed is a no-op.
    pub fn remove(&self, key: InlineHookKey) -> Result<(), HookError> {
        let mut hooks = self.hooks.write();
        let record = hooks.get_mut(key).ok_or(HookError::NotFound)?;
        unsafe { record.remove(&self.memory) }
    }

    /// Install every registered hook, stopping at the first failure
    pub fn install_all(&self) -> Result<(), HookError> {
        let mut hooks = self.hooks.write();
        for (_, record) in hooks.iter_mut() {
            unsafe { record.install(&self.memory) }.map_err(|e| {
                tracing::error!("Failed to install hook '{}': {}", record.name, e);
                e
            })?;
            tracing::info!("Installed hook '{}' at {:x}", record.name, record.target);
        }
        Ok(())
    }

    /// Remove every installed hook, logging failures
    pub fn remove_all(&self) {
        let mut hooks = self.hooks.write();
        for (_, record) in hooks.iter_mut() {
            if let Err(e) = unsafe { record.remove(&self.memory) } {
                tracing::error!("Failed to remove hook '{}': {}", record.name, e);
            }
        }
    }

    pub fn is_installed(&self, key: InlineHookKey) -> bool {
        self.hooks
            .read()
            .get(key)
            .map(HookRecord::is_installed)
            .unwrap_or(false)
    }

    pub fn record(&self, key: InlineHookKey) -> Option<HookRecord> {
        self.hooks.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Take one hook out of the way until the guard drops
    ///
    /// The table lock is not held while the guard lives, so the real
    /// function may be called freely.
    pub fn suspend(&self, key: InlineHookKey) -> SuspendGuard<'_, M> {
        if let Err(e) = self.remove(key) {
            tracing::error!("Failed to suspend hook: {}", e);
        }
        SuspendGuard { table: self, key }
    }
}

/// Reinstalls a suspended hook on drop
pub struct SuspendGuard<'a, M: CodeMemory> {
    table: &'a HookTable<M>,
    key: InlineHookKey,
}

impl<M: CodeMemory> Drop for SuspendGuard<'_, M> {
    fn drop(&mut self) {
        if let Err(e) = self.table.install(self.key) {
            tracing::error!("Failed to reinstall hook: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Sparse fake code memory; unknown bytes read as INT3
    #[derive(Default)]
    pub struct FakeMemory {
        pub bytes: Mutex<HashMap<usize, u8>>,
        pub writes: Mutex<Vec<usize>>,
        pub fail_writes: Mutex<bool>,
    }

    impl FakeMemory {
        pub fn peek(&self, address: usize, len: usize) -> Vec<u8> {
            let bytes = self.bytes.lock();
            (address..address + len)
                .map(|a| bytes.get(&a).copied().unwrap_or(0xCC))
                .collect()
        }

        pub fn poke(&self, address: usize, data: &[u8]) {
            let mut bytes = self.bytes.lock();
            for (i, b) in data.iter().enumerate() {
                bytes.insert(address + i, *b);
            }
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().len()
        }
    }

    impl CodeMemory for FakeMemory {
        unsafe fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), HookError> {
            buf.copy_from_slice(&self.peek(address, buf.len()));
            Ok(())
        }

        unsafe fn write(&self, address: usize, data: &[u8]) -> Result<(), HookError> {
            if *self.fail_writes.lock() {
                return Err(HookError::MemoryProtection("denied".into()));
            }
            self.poke(address, data);
            self.writes.lock().push(address);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeMemory;
    use super::*;

    const TARGET: usize = 0x1000;
    const REPLACEMENT: usize = 0x7FF0_1234_5678;
    const PROLOGUE: [u8; 12] = [
        0x48, 0x89, 0x5C, 0x24, 0x08, 0x57, 0x48, 0x83, 0xEC, 0x20, 0x48, 0x8B,
    ];

    fn table() -> (HookTable<FakeMemory>, InlineHookKey) {
        let table = HookTable::new(FakeMemory::default());
        table.memory().poke(TARGET, &PROLOGUE);
        let key = table.register("test", TARGET, REPLACEMENT).unwrap();
        (table, key)
    }

    #[test]
    fn test_install_writes_jump_and_saves_prologue() {
        let (table, key) = table();
        table.install(key).unwrap();

        let record = table.record(key).unwrap();
        assert!(record.is_installed());
        assert_eq!(record.saved_bytes(), &PROLOGUE);
        assert_eq!(
            table.memory().peek(TARGET, PATCH_LEN),
            encode_absolute_jump(REPLACEMENT as u64).unwrap().to_vec()
        );
    }

    #[test]
    fn test_remove_restores_prologue() {
        let (table, key) = table();
        table.install(key).unwrap();
        table.remove(key).unwrap();

        assert!(!table.is_installed(key));
        assert_eq!(table.memory().peek(TARGET, PATCH_LEN), PROLOGUE.to_vec());
        assert!(table.record(key).unwrap().saved_bytes().is_empty());
    }

    #[test]
    fn test_remove_when_not_installed_is_noop() {
        let (table, key) = table();
        table.remove(key).unwrap();
        table.remove(key).unwrap();
        assert_eq!(table.memory().write_count(), 0);
    }

    #[test]
    fn test_install_twice_keeps_original_bytes() {
        let (table, key) = table();
        table.install(key).unwrap();
        table.install(key).unwrap();

        assert_eq!(table.memory().write_count(), 1);
        assert_eq!(table.record(key).unwrap().saved_bytes(), &PROLOGUE);
    }

    #[test]
    fn test_suspend_guard_reinstalls() {
        let (table, key) = table();
        table.install(key).unwrap();

        {
            let _guard = table.suspend(key);
            assert!(!table.is_installed(key));
            assert_eq!(table.memory().peek(TARGET, PATCH_LEN), PROLOGUE.to_vec());
        }

        assert!(table.is_installed(key));
        assert_eq!(table.memory().write_count(), 3);
    }

    #[test]
    fn test_failed_write_leaves_hook_uninstalled() {
        let (table, key) = table();
        *table.memory().fail_writes.lock() = true;

        assert!(matches!(table.install(key), Err(HookError::MemoryProtection(_))));
        assert!(!table.is_installed(key));
        assert!(table.record(key).unwrap().saved_bytes().is_empty());
    }

    #[test]
    fn test_null_target_rejected() {
        let table = HookTable::new(FakeMemory::default());
        assert!(matches!(
            table.register("null", 0, REPLACEMENT),
            Err(HookError::InvalidAddress(0))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_install_all_and_remove_all() {
        let table = HookTable::new(FakeMemory::default());
        let a = table.register("a", 0x1000, REPLACEMENT).unwrap();
        let b = table.register("b", 0x2000, REPLACEMENT).unwrap();
        table.install_all().unwrap();
        assert!(table.is_installed(a) && table.is_installed(b));

        table.remove_all();
        assert!(!table.is_installed(a) && !table.is_installed(b));
        assert_eq!(table.len(), 2);
    }
}
