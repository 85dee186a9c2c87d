//! Executable memory for generated code.
//!
//! Pages are mapped writable, filled, then flipped to read+execute. On macOS
//! the region is mapped with `MAP_JIT` and written with the per-thread write
//! protection lifted instead.

use crate::core::{FatalError, FatalResult};

/// Owned mapping holding one routine. Unmapped on drop.
#[derive(Debug)]
pub struct ExecutableBuffer {
    ptr: *mut u8,
    len: usize,
}

impl ExecutableBuffer {
    pub fn from_code(code: &[u8]) -> FatalResult<Self> {
        if code.is_empty() {
            return Err(FatalError::ExecutableMemory(
                "cannot map an empty routine".to_string(),
            ));
        }
        let ptr = alloc_region(code.len())?;
        let buffer = Self {
            ptr,
            len: code.len(),
        };
        write_code(ptr, code)?;
        finalize_region(ptr, code.len())?;
        log::debug!("mapped {} bytes of code at {:p}", code.len(), ptr);
        Ok(buffer)
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for ExecutableBuffer {
    fn drop(&mut self) {
        if let Err(err) = free_region(self.ptr, self.len) {
            log::warn!("failed to unmap generated code: {}", err);
        }
    }
}

fn os_error(what: &str) -> FatalError {
    FatalError::ExecutableMemory(format!("{} failed: {}", what, std::io::Error::last_os_error()))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn alloc_region(len: usize) -> FatalResult<*mut u8> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_ANON | libc::MAP_PRIVATE,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(os_error("mmap"));
    }
    Ok(ptr as *mut u8)
}

#[cfg(target_os = "macos")]
fn alloc_region(len: usize) -> FatalResult<*mut u8> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
            libc::MAP_ANON | libc::MAP_PRIVATE | libc::MAP_JIT,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(os_error("mmap(MAP_JIT)"));
    }
    Ok(ptr as *mut u8)
}

#[cfg(not(unix))]
fn alloc_region(_len: usize) -> FatalResult<*mut u8> {
    Err(FatalError::ExecutableMemory(
        "executable memory is only implemented for unix hosts".to_string(),
    ))
}

#[cfg(unix)]
fn free_region(ptr: *mut u8, len: usize) -> FatalResult<()> {
    if ptr.is_null() {
        return Ok(());
    }
    let rc = unsafe { libc::munmap(ptr as *mut libc::c_void, len) };
    if rc != 0 {
        return Err(os_error("munmap"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn free_region(_ptr: *mut u8, _len: usize) -> FatalResult<()> {
    Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn write_code(ptr: *mut u8, code: &[u8]) -> FatalResult<()> {
    unsafe {
        std::ptr::copy_nonoverlapping(code.as_ptr(), ptr, code.len());
        #[cfg(target_arch = "aarch64")]
        __clear_cache(
            ptr as *mut libc::c_char,
            ptr.add(code.len()) as *mut libc::c_char,
        );
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn write_code(ptr: *mut u8, code: &[u8]) -> FatalResult<()> {
    unsafe {
        let write_protect = pthread_jit_write_protect_supported_np() != 0;
        if write_protect {
            pthread_jit_write_protect_np(0);
        }
        std::ptr::copy_nonoverlapping(code.as_ptr(), ptr, code.len());
        sys_icache_invalidate(ptr as *mut libc::c_void, code.len());
        if write_protect {
            pthread_jit_write_protect_np(1);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn write_code(_ptr: *mut u8, _code: &[u8]) -> FatalResult<()> {
    Err(FatalError::ExecutableMemory(
        "executable memory is only implemented for unix hosts".to_string(),
    ))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn finalize_region(ptr: *mut u8, len: usize) -> FatalResult<()> {
    let rc = unsafe { libc::mprotect(ptr as *mut libc::c_void, len, libc::PROT_READ | libc::PROT_EXEC) };
    if rc != 0 {
        return Err(os_error("mprotect(PROT_READ|PROT_EXEC)"));
    }
    Ok(())
}

#[cfg(any(target_os = "macos", not(unix)))]
fn finalize_region(_ptr: *mut u8, _len: usize) -> FatalResult<()> {
    Ok(())
}

#[cfg(target_os = "macos")]
unsafe extern "C" {
    fn pthread_jit_write_protect_supported_np() -> libc::c_int;
    fn pthread_jit_write_protect_np(enabled: libc::c_int);
    fn sys_icache_invalidate(start: *mut libc::c_void, len: libc::size_t);
}

#[cfg(all(unix, not(target_os = "macos"), target_arch = "aarch64"))]
unsafe extern "C" {
    fn __clear_cache(begin: *mut libc::c_char, end: *mut libc::c_char);
}
