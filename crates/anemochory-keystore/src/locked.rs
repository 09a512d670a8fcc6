//! Best-effort page-locked secret buffer.
//!
//! While a handle is live, the master key's backing pages are pinned with
//! `mlock` (via the `region` crate) so the OS cannot swap them to disk. On
//! platforms or environments where locking fails (container without
//! `CAP_IPC_LOCK`, non-unix target), this degrades silently to a plain
//! zeroize-on-drop buffer — the key is still wiped on drop, just not pinned.

use zeroize::Zeroize;

pub struct LockedBytes {
    buf: Box<[u8]>,
    #[cfg(unix)]
    guard: Option<region::LockGuard>,
}

impl LockedBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        let buf = bytes.into_boxed_slice();
        #[cfg(unix)]
        let guard = region::lock(buf.as_ptr(), buf.len()).ok();

        Self {
            buf,
            #[cfg(unix)]
            guard,
        }
    }

    pub fn expose(&self) -> &[u8] {
        &self.buf
    }

    #[cfg(test)]
    pub fn is_page_locked(&self) -> bool {
        #[cfg(unix)]
        {
            self.guard.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

impl Drop for LockedBytes {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_original_bytes() {
        let locked = LockedBytes::new(vec![1, 2, 3, 4]);
        assert_eq!(locked.expose(), &[1, 2, 3, 4]);
    }

    #[test]
    fn locking_does_not_panic_even_if_unsupported() {
        let locked = LockedBytes::new(vec![0u8; 32]);
        let _ = locked.is_page_locked();
    }
}
