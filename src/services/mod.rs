//! The Core Services layer: one module per native capability, aggregated
//! into a single `Services` struct shared (via `Arc`) by every window's
//! `Bridge` in the runtime: services sit below the per-window bridge/router
//! and are addressed by id rather than owned per window.

pub mod ai;
pub mod broadcast_channel;
pub mod diagnostics;
pub mod dns;
pub mod fs;
pub mod geolocation;
pub mod notifications;
pub mod os;
pub mod permissions;
pub mod platform;
pub mod process;
pub mod timers;
pub mod udp;

use std::sync::Arc;

use crate::protocol::ProtocolRegistry;
use crate::result::SharedQueuedResponseStore;
use ai::AiService;
use broadcast_channel::BroadcastChannelService;
use diagnostics::DiagnosticsService;
use dns::DnsService;
use fs::FsService;
use geolocation::GeolocationService;
use notifications::NotificationsService;
use os::OsService;
use permissions::PermissionsService;
use platform::PlatformService;
use process::ProcessService;
use timers::TimersService;
use udp::UdpService;

pub struct Services {
    pub fs: Arc<FsService>,
    pub udp: Arc<UdpService>,
    pub process: Arc<ProcessService>,
    pub timers: Arc<TimersService>,
    pub dns: Arc<DnsService>,
    pub os: Arc<OsService>,
    pub platform: Arc<PlatformService>,
    pub notifications: Arc<NotificationsService>,
    pub permissions: Arc<PermissionsService>,
    pub broadcast_channel: Arc<BroadcastChannelService>,
    pub geolocation: Arc<GeolocationService>,
    pub diagnostics: Arc<DiagnosticsService>,
    pub ai: Arc<AiService>,
    pub protocols: Arc<ProtocolRegistry>,
    pub queued_responses: SharedQueuedResponseStore,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            fs: Arc::new(FsService::new()),
            udp: Arc::new(UdpService::new()),
            process: Arc::new(ProcessService::new()),
            timers: Arc::new(TimersService::new()),
            dns: Arc::new(DnsService::new()),
            os: Arc::new(OsService::new()),
            platform: Arc::new(PlatformService::new()),
            notifications: Arc::new(NotificationsService::new()),
            permissions: Arc::new(PermissionsService::new()),
            broadcast_channel: Arc::new(BroadcastChannelService::new()),
            geolocation: Arc::new(GeolocationService::new()),
            diagnostics: Arc::new(DiagnosticsService::new()),
            ai: Arc::new(AiService::new()),
            protocols: Arc::new(ProtocolRegistry::new()),
            queued_responses: Arc::new(crate::result::QueuedResponseStore::new()),
        }
    }
}

impl Services {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}
