// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend setup errors and kernel errno extraction.

use std::io;
use std::path::PathBuf;

use drm::control::GetPlanarFramebufferError;
use liftoff_core::error::Errno;

/// Errors from opening and preparing a DRM device.
///
/// Failures once the device is running are reported to the allocator as
/// [`Errno`] values instead.
#[derive(Debug, thiserror::Error)]
pub enum DrmError {
    /// The device node could not be opened.
    #[error("failed to open DRM node {}: {source}", .path.display())]
    Open {
        /// Path of the node.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The driver refused a client capability the allocator relies on.
    #[error("DRM client capability {capability} not supported: {source}")]
    Capability {
        /// Name of the capability.
        capability: &'static str,
        /// Underlying error.
        source: io::Error,
    },
}

/// Extracts the kernel errno from an I/O error returned by `drm`.
///
/// Errors that did not come from a system call map to `EIO`.
pub(crate) fn errno_of(err: &io::Error) -> Errno {
    let errno = rustix::io::Errno::from_io_error(err).unwrap_or(rustix::io::Errno::IO);
    Errno(errno.raw_os_error())
}

/// Sorts a failed `GETFB2` lookup into "no metadata" (`None`) and a real
/// error.
///
/// Kernels without the ioctl answer `EINVAL`, and `drm` refuses pixel formats
/// it cannot name. Neither stops the framebuffer from being scanned out.
pub(crate) fn planar_fb_error(err: &GetPlanarFramebufferError) -> Option<Errno> {
    match err {
        GetPlanarFramebufferError::Io(err) => Some(errno_of(err)).filter(|e| *e != Errno::EINVAL),
        GetPlanarFramebufferError::UnrecognizedFourcc(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use drm::buffer::UnrecognizedFourcc;

    use super::*;

    #[test]
    fn kernel_errors_keep_their_value() {
        for errno in [Errno::EINVAL, Errno::ENOSPC, Errno::EBUSY, Errno::EINTR] {
            let err = io::Error::from_raw_os_error(errno.0);
            assert_eq!(errno_of(&err), errno);
        }
    }

    #[test]
    fn synthetic_errors_become_eio() {
        let err = io::Error::other("unknown fourcc");
        assert_eq!(errno_of(&err), Errno(rustix::io::Errno::IO.raw_os_error()));
        assert!(!errno_of(&err).is_incompatibility());
    }

    #[test]
    fn missing_getfb2_means_no_metadata() {
        let old_kernel =
            GetPlanarFramebufferError::Io(io::Error::from_raw_os_error(Errno::EINVAL.0));
        assert_eq!(planar_fb_error(&old_kernel), None);

        let odd_format = GetPlanarFramebufferError::UnrecognizedFourcc(UnrecognizedFourcc(0));
        assert_eq!(planar_fb_error(&odd_format), None);
    }

    #[test]
    fn other_getfb2_failures_are_reported() {
        for errno in [Errno::ENOENT, Errno::EBUSY] {
            let err = GetPlanarFramebufferError::Io(io::Error::from_raw_os_error(errno.0));
            assert_eq!(planar_fb_error(&err), Some(errno));
        }
    }

    #[test]
    fn open_error_names_the_node() {
        let err = DrmError::Open {
            path: PathBuf::from("/dev/dri/card7"),
            source: io::Error::from_raw_os_error(Errno::ENOENT.0),
        };
        assert!(err.to_string().starts_with("failed to open DRM node /dev/dri/card7: "));
    }
}
