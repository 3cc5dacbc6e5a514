//! Password type with memory hygiene
//!
//! [`Password`] carries secret bytes between the store and its backend. The
//! buffer is zeroed on drop, never printed, and compared in constant time.
//!
//! On unix the pages backing the buffer are also locked in memory. This is
//! best effort: `mlock` failures (for example a low `RLIMIT_MEMLOCK`) are
//! ignored, and a locked page may also hold unrelated heap data. Page locks
//! do not stack in the kernel, so they are reference counted here and a page
//! is only unlocked once no live password uses it.

use std::fmt;
use zeroize::Zeroize;

/// Secret payload associated with an item identifier
pub struct Password {
    bytes: Vec<u8>,
}

impl Password {
    /// Create a password from text
    pub fn new(text: impl Into<String>) -> Self {
        Self::from_bytes(text.into().into_bytes())
    }

    /// Create a password from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        #[cfg(unix)]
        page_lock::lock(&bytes);

        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the password as text, if it is valid UTF-8
    pub fn to_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    /// Copy the password out as a plain `String`
    ///
    /// The copy is not zeroed on drop.
    pub fn expose(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Constant-time comparison
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        if self.bytes.len() != other.bytes.len() {
            return false;
        }

        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Clone for Password {
    fn clone(&self) -> Self {
        Self::from_bytes(self.bytes.clone())
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        #[cfg(unix)]
        page_lock::unlock(&self.bytes);

        self.bytes.zeroize();
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password(***)")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.constant_time_eq(other)
    }
}

impl Eq for Password {}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Vec<u8>> for Password {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Best-effort, reference-counted mlock/munlock of the pages backing a buffer
#[cfg(unix)]
mod page_lock {
    use libc::{_SC_PAGESIZE, c_void, mlock, munlock, sysconf};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// page address -> number of live buffers using it
    static LOCKED_PAGES: Mutex<BTreeMap<usize, usize>> = Mutex::new(BTreeMap::new());

    pub(super) fn page_size() -> Option<usize> {
        // SAFETY: sysconf has no preconditions.
        let page_size = unsafe { sysconf(_SC_PAGESIZE) };
        (page_size > 0).then_some(page_size as usize)
    }

    /// Addresses of every page the buffer touches
    fn pages(data: &[u8]) -> Vec<usize> {
        let Some(page_size) = page_size() else {
            return Vec::new();
        };
        if data.is_empty() {
            return Vec::new();
        }

        let start = data.as_ptr() as usize;
        let first = start & !(page_size - 1);
        let last = (start + data.len() - 1) & !(page_size - 1);
        (first..=last).step_by(page_size).collect()
    }

    pub(super) fn lock(data: &[u8]) {
        let pages = pages(data);
        if pages.is_empty() {
            return;
        }
        let Some(page_size) = page_size() else { return };

        let mut locked = LOCKED_PAGES
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for page in pages {
            let refs = locked.entry(page).or_insert(0);
            if *refs == 0 {
                // SAFETY: the page belongs to a live allocation; failure is ignored.
                let _ = unsafe { mlock(page as *const c_void, page_size) };
            }
            *refs += 1;
        }
    }

    pub(super) fn unlock(data: &[u8]) {
        let pages = pages(data);
        if pages.is_empty() {
            return;
        }
        let Some(page_size) = page_size() else { return };

        let mut locked = LOCKED_PAGES
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for page in pages {
            let Some(refs) = locked.get_mut(&page) else { continue };
            *refs -= 1;
            if *refs == 0 {
                locked.remove(&page);
                // SAFETY: same page as passed to `lock`; failure is ignored.
                let _ = unsafe { munlock(page as *const c_void, page_size) };
            }
        }
    }

    #[cfg(test)]
    pub(super) fn refs(page: usize) -> usize {
        LOCKED_PAGES
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&page)
            .copied()
            .unwrap_or(0)
    }
}
