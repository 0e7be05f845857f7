//! Kernel-backed table store
//!
//! Production [`TableStore`] implementation over a pinned eBPF map-in-map.
//! The outer map (`BPF_MAP_TYPE_HASH_OF_MAPS`, pinned by the datapath
//! loader) maps 192-byte cluster keys to inner map ids; each publish creates
//! a fresh single-entry `BPF_MAP_TYPE_ARRAY` holding the full backend vector
//! and swaps it in. The kernel performs the reader-visible pointer swap and
//! frees the replaced inner map once its references drop.
//!
//! Requires CAP_BPF (or root) and a mounted bpffs; compiled only with the
//! `ebpf` feature.

use std::ffi::CString;
use std::os::raw::c_void;

use super::publisher::{InnerHandle, OuterKey, PublishError, TableStore, MAGLEV_INNER_MAP_NAME};
use super::LbError;

/// [`TableStore`] backed by a pinned BPF outer map.
pub struct PinnedMapStore {
    outer_fd: i32,
}

impl PinnedMapStore {
    /// Attach to the outer map pinned at `pin_path`
    /// (e.g. `/sys/fs/bpf/outer_of_maglev`).
    pub fn open(pin_path: &str) -> Result<Self, LbError> {
        let c_path = CString::new(pin_path)
            .map_err(|_| LbError::OuterMapUnavailable("pin path contains a nul byte".into()))?;
        let fd = unsafe { libbpf_sys::bpf_obj_get(c_path.as_ptr()) };
        if fd < 0 {
            return Err(LbError::OuterMapUnavailable(format!(
                "bpf_obj_get({pin_path}): {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(Self { outer_fd: fd })
    }
}

impl Drop for PinnedMapStore {
    fn drop(&mut self) {
        if self.outer_fd >= 0 {
            unsafe { libc::close(self.outer_fd) };
        }
    }
}

impl TableStore for PinnedMapStore {
    fn create_inner(&self, table_size: u64) -> Result<InnerHandle, PublishError> {
        let value_size = table_size
            .checked_mul(std::mem::size_of::<u32>() as u64)
            .filter(|&size| size <= u32::MAX as u64)
            .ok_or_else(|| {
                PublishError::InnerCreate(format!("table size {table_size} overflows map value"))
            })?;

        let name = CString::new(MAGLEV_INNER_MAP_NAME)
            .map_err(|_| PublishError::InnerCreate("map name contains a nul byte".into()))?;

        let fd = unsafe {
            libbpf_sys::bpf_map_create(
                libbpf_sys::BPF_MAP_TYPE_ARRAY,
                name.as_ptr(),
                std::mem::size_of::<u32>() as u32,
                value_size as u32,
                1,
                std::ptr::null(),
            )
        };
        if fd < 0 {
            return Err(PublishError::InnerCreate(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(InnerHandle(fd as u32))
    }

    fn write_inner(&self, handle: InnerHandle, backends: &[u32]) -> Result<(), PublishError> {
        // The kernel consumes the vector in native byte order.
        let mut blob = Vec::with_capacity(backends.len() * std::mem::size_of::<u32>());
        for &index in backends {
            blob.extend_from_slice(&index.to_ne_bytes());
        }

        let key: u32 = 0;
        let rc = unsafe {
            libbpf_sys::bpf_map_update_elem(
                handle.0 as i32,
                &key as *const u32 as *const c_void,
                blob.as_ptr() as *const c_void,
                0,
            )
        };
        if rc != 0 {
            return Err(PublishError::InnerUpdate(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(())
    }

    fn set_outer(&self, key: &OuterKey, handle: InnerHandle) -> Result<(), PublishError> {
        if self.outer_fd < 0 {
            return Err(PublishError::Uninitialized);
        }

        let inner_fd = handle.0;
        let rc = unsafe {
            libbpf_sys::bpf_map_update_elem(
                self.outer_fd,
                key.as_bytes().as_ptr() as *const c_void,
                &inner_fd as *const u32 as *const c_void,
                0,
            )
        };
        if rc != 0 {
            return Err(PublishError::OuterUpdate(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(())
    }

    fn release_inner(&self, handle: InnerHandle) {
        // The outer map keeps its own reference; closing our fd is enough.
        unsafe { libc::close(handle.0 as i32) };
    }
}
