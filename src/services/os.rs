//! Host OS introspection: platform name, architecture, CPU topology,
//! uptime, memory, resource usage and network interfaces. Everything here
//! is read-only and side-effect free, so the service carries no table to
//! lock, only the clock it was constructed with.

use libc::c_char;
use serde_json::{Value, json};
use std::ffi::CStr;
use std::time::Instant;

#[derive(Debug)]
pub struct OsService {
    started_at: Instant,
}

impl Default for OsService {
    fn default() -> Self {
        Self::new()
    }
}

impl OsService {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn platform(&self) -> &'static str {
        std::env::consts::OS
    }

    pub fn arch(&self) -> &'static str {
        std::env::consts::ARCH
    }

    pub fn cpus(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn uptime(&self) -> Value {
        json!({
            "platform": self.platform(),
            "arch": self.arch(),
            "cpus": self.cpus(),
            "uptimeMillis": self.started_at.elapsed().as_millis() as u64,
        })
    }

    /// `process.hrtime()`-style monotonic `[seconds, nanoseconds]` pair.
    pub fn hrtime(&self) -> Value {
        let elapsed = self.started_at.elapsed();
        json!([elapsed.as_secs(), elapsed.subsec_nanos()])
    }

    /// `os.uname()`'s sysname/nodename/release/version/machine fields.
    pub fn uname(&self) -> Value {
        unsafe {
            let mut uts: libc::utsname = std::mem::zeroed();
            if libc::uname(&mut uts) != 0 {
                return json!({});
            }
            json!({
                "sysname": cstr_field(&uts.sysname),
                "nodename": cstr_field(&uts.nodename),
                "release": cstr_field(&uts.release),
                "version": cstr_field(&uts.version),
                "machine": cstr_field(&uts.machine),
            })
        }
    }

    /// `getrusage(RUSAGE_SELF)`, translated to camelCase fields.
    pub fn rusage(&self) -> Value {
        unsafe {
            let mut usage: libc::rusage = std::mem::zeroed();
            if libc::getrusage(libc::RUSAGE_SELF, &mut usage) != 0 {
                return json!({});
            }
            json!({
                "userCpuMicros": usage.ru_utime.tv_sec as i64 * 1_000_000 + usage.ru_utime.tv_usec as i64,
                "systemCpuMicros": usage.ru_stime.tv_sec as i64 * 1_000_000 + usage.ru_stime.tv_usec as i64,
                "maxRss": usage.ru_maxrss,
                "minorPageFaults": usage.ru_minflt,
                "majorPageFaults": usage.ru_majflt,
            })
        }
    }

    /// Free physical memory in bytes, via `sysconf(_SC_AVPHYS_PAGES)`.
    pub fn available_memory(&self) -> u64 {
        unsafe {
            let pages = libc::sysconf(libc::_SC_AVPHYS_PAGES);
            let page_size = libc::sysconf(libc::_SC_PAGE_SIZE);
            if pages < 0 || page_size < 0 {
                0
            } else {
                pages as u64 * page_size as u64
            }
        }
    }

    /// Well-known filesystem roots a renderer needs without shelling out.
    pub fn paths(&self) -> Value {
        json!({
            "home": std::env::var("HOME").unwrap_or_default(),
            "temp": std::env::temp_dir().to_string_lossy(),
            "cwd": crate::utils::current_working_directory(),
        })
    }

    /// Default chunk size `fs.read` and socket reads size their buffers to
    /// when the caller doesn't request a specific `size`.
    pub fn buffer_size(&self) -> u64 {
        64 * 1024
    }

    /// The `O_*`/`S_*` numeric constants callers need to build `fs.open`
    /// flags and interpret `fs.stat` modes instead of hardcoding them.
    pub fn constants(&self) -> Value {
        json!({
            "O_RDONLY": libc::O_RDONLY,
            "O_WRONLY": libc::O_WRONLY,
            "O_RDWR": libc::O_RDWR,
            "O_CREAT": libc::O_CREAT,
            "O_TRUNC": libc::O_TRUNC,
            "O_APPEND": libc::O_APPEND,
            "S_IFMT": libc::S_IFMT,
            "S_IFDIR": libc::S_IFDIR,
            "S_IFREG": libc::S_IFREG,
        })
    }

    /// Network interfaces via `getifaddrs`: name, family and address for
    /// every IPv4/IPv6 entry (link-layer entries are skipped).
    pub fn network_interfaces(&self) -> Value {
        let mut interfaces = Vec::new();
        unsafe {
            let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
            if libc::getifaddrs(&mut head) != 0 {
                return json!(interfaces);
            }
            let mut cursor = head;
            while !cursor.is_null() {
                let entry = &*cursor;
                if !entry.ifa_name.is_null() && !entry.ifa_addr.is_null() {
                    let name = CStr::from_ptr(entry.ifa_name).to_string_lossy().into_owned();
                    let family = (*entry.ifa_addr).sa_family as i32;
                    let entry_json = match family {
                        libc::AF_INET => {
                            let addr_in = &*(entry.ifa_addr as *const libc::sockaddr_in);
                            let address = std::net::Ipv4Addr::from(u32::from_be(addr_in.sin_addr.s_addr));
                            Some(json!({ "name": name, "family": "IPv4", "address": address.to_string() }))
                        }
                        libc::AF_INET6 => {
                            let addr_in6 = &*(entry.ifa_addr as *const libc::sockaddr_in6);
                            let address = std::net::Ipv6Addr::from(addr_in6.sin6_addr.s6_addr);
                            Some(json!({ "name": name, "family": "IPv6", "address": address.to_string() }))
                        }
                        _ => None,
                    };
                    if let Some(entry_json) = entry_json {
                        interfaces.push(entry_json);
                    }
                }
                cursor = entry.ifa_next;
            }
            libc::freeifaddrs(head);
        }
        json!(interfaces)
    }
}

fn cstr_field(buf: &[c_char]) -> String {
    unsafe { CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_nonzero_cpu_count() {
        let svc = OsService::new();
        assert!(svc.cpus() >= 1);
    }

    #[test]
    fn uname_reports_a_sysname() {
        let svc = OsService::new();
        let info = svc.uname();
        assert!(!info["sysname"].as_str().unwrap_or_default().is_empty());
    }

    #[test]
    fn hrtime_advances() {
        let svc = OsService::new();
        let first = svc.hrtime();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = svc.hrtime();
        assert!(second[1].as_u64().unwrap() != first[1].as_u64().unwrap() || second[0].as_u64().unwrap() >= first[0].as_u64().unwrap());
    }

    #[test]
    fn constants_exposes_open_flags() {
        let svc = OsService::new();
        let constants = svc.constants();
        assert_eq!(constants["O_RDONLY"], json!(libc::O_RDONLY));
    }
}
