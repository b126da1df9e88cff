//! The default route table: `default_router()` builds a `Router` wired to
//! every `Services` member, mirroring `mapIPCRoutes` in
//! `original_source/src/runtime/ipc/routes.cc` — one function that takes a
//! router and calls `.map(name, handler)` per route, alias entries
//! included.
//!
//! Async services (`udp`, `dns`, `process::write`) are bridged into the
//! router's synchronous dispatch point via `tokio::runtime::Handle::
//! block_on`; the surrounding event loop's own dispatched closures never
//! themselves block past this, since the handler returns promptly once the
//! underlying I/O call completes (a local socket bind, a DNS query). This
//! mirrors how the original runtime's own route closures call into a
//! blocking-capable I/O backend from the loop thread.

use serde_json::json;

use crate::bridge::Bridge;
use crate::error::RouteError;
use crate::message::Message;
use crate::result::IpcResult;
use crate::router::Router;

/// Bridges an async service call into the router's synchronous dispatch
/// point. Only safe to call from outside a `tokio` task context (e.g. the
/// `HostPumpLoop` driver, or tests); `DedicatedThreadLoop` routes that need
/// this would instead be completed asynchronously and replied to later,
/// which is future work tracked in DESIGN.md.
fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new()
        .expect("failed to build blocking bridge runtime")
        .block_on(future)
}

pub fn default_router() -> Router {
    let mut router = Router::new();

    router.map("ping", std::sync::Arc::new(|_bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, json!("pong")))
    }));

    register_fs_routes(&mut router);
    register_udp_routes(&mut router);
    register_process_routes(&mut router);
    register_timer_routes(&mut router);
    register_dns_routes(&mut router);
    register_os_platform_routes(&mut router);
    register_notification_permission_routes(&mut router);
    register_broadcast_geolocation_routes(&mut router);
    register_ai_routes(&mut router);
    register_service_worker_routes(&mut router);
    register_window_routes(&mut router);
    register_queued_response_routes(&mut router);
    register_protocol_routes(&mut router);

    router
}

fn register_fs_routes(router: &mut Router) {
    router.map("fs.open", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        let flags = message.require_i32("flags")?;
        let mode = message.get("mode").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0o644);
        let id = bridge.services.fs.open(path, flags, mode)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("fs.close", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.fs.close(id)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("fs.read", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        let size = message.get("size").and_then(|v| v.parse::<usize>().ok()).unwrap_or(65536);
        let offset = message.get("offset").and_then(|v| v.parse::<u64>().ok());
        let data = bridge.services.fs.read(id, size, offset)?;
        let queued = crate::result::QueuedResponse::octet_stream(bridge.ids.next(), bytes::Bytes::from(data));
        let response_id = queued.id;
        bridge.queued_responses.insert(queued.clone());
        Ok(IpcResult::ok_with_queued(message, json!({ "id": response_id }), queued))
    }));

    router.map("fs.write", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        let offset = message.get("offset").and_then(|v| v.parse::<u64>().ok());
        let written = bridge.services.fs.write(id, &message.buffer, offset)?;
        Ok(IpcResult::ok(message, json!({ "written": written })))
    }));

    router.map("fs.stat", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        Ok(IpcResult::ok(message, bridge.services.fs.stat(path)?))
    }));

    router.map("fs.mkdir", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        bridge.services.fs.mkdir(path, message.get_bool("recursive"))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.rmdir", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        bridge.services.fs.rmdir(message.require_str("path")?)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.unlink", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        bridge.services.fs.unlink(message.require_str("path")?)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.rename", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let from = message.require_str("from")?;
        let to = message.require_str("to")?;
        bridge.services.fs.rename(from, to)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    // `readdir` serves two shapes off one route: a plain `path` is the
    // one-shot full listing, an `id` (from `fs.opendir`) pages through a
    // standing directory stream.
    router.map("fs.readdir", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        if let Some(id) = message.get("id").and_then(|v| v.parse::<u64>().ok()) {
            let count = message.get("entries").and_then(|v| v.parse::<usize>().ok());
            let entries = bridge.services.fs.readdir_page(id, count)?;
            return Ok(IpcResult::ok(message, json!({ "entries": entries })));
        }
        let entries = bridge.services.fs.readdir(message.require_str("path")?)?;
        Ok(IpcResult::ok(message, json!({ "entries": entries })))
    }));

    router.map("fs.opendir", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = bridge.services.fs.opendir(message.require_str("path")?)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("fs.closedir", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.fs.closedir(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    let watch_handler: crate::router::RouteHandler = std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = bridge.services.fs.watch(message.require_str("path")?)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    });
    router.map_aliases(&["fs.watch", "fs.startWatch"], watch_handler);

    let unwatch_handler: crate::router::RouteHandler = std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.fs.unwatch(id)?;
        Ok(IpcResult::ok(message, json!({})))
    });
    router.map_aliases(&["fs.stopWatch", "fs.unwatch"], unwatch_handler);

    router.map("fs.access", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        let mode = message.get("mode").and_then(|v| v.parse::<i32>().ok()).unwrap_or(libc::F_OK);
        bridge.services.fs.access(path, mode)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.chmod", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        let mode = message.get("mode").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0o644);
        bridge.services.fs.chmod(path, mode)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.chown", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        let uid = message.get("uid").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        let gid = message.get("gid").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        bridge.services.fs.chown(path, uid, gid)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.lchown", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        let uid = message.get("uid").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        let gid = message.get("gid").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        bridge.services.fs.lchown(path, uid, gid)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.copyFile", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let from = message.require_str("from")?;
        let to = message.require_str("to")?;
        let bytes = bridge.services.fs.copy_file(from, to)?;
        Ok(IpcResult::ok(message, json!({ "bytesCopied": bytes })))
    }));

    router.map("fs.link", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let existing = message.require_str("existingPath")?;
        let new = message.require_str("newPath")?;
        bridge.services.fs.link(existing, new)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.symlink", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let target = message.require_str("target")?;
        let path = message.require_str("path")?;
        bridge.services.fs.symlink(target, path)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.readlink", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        Ok(IpcResult::ok(message, json!({ "target": bridge.services.fs.readlink(path)? })))
    }));

    router.map("fs.realpath", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        Ok(IpcResult::ok(message, json!({ "path": bridge.services.fs.realpath(path)? })))
    }));

    router.map("fs.lstat", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        Ok(IpcResult::ok(message, bridge.services.fs.lstat(path)?))
    }));

    router.map("fs.fstat", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        Ok(IpcResult::ok(message, bridge.services.fs.fstat(id)?))
    }));

    router.map("fs.fsync", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.fs.fsync(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.ftruncate", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        let len = message.get("length").and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        bridge.services.fs.ftruncate(id, len)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.retainOpenDescriptor", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.fs.retain_open_descriptor(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("fs.getOpenDescriptors", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, json!({ "descriptors": bridge.services.fs.get_open_descriptors() })))
    }));

    router.map("fs.closeOpenDescriptors", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let preserve_retained = message.get_bool("preserveRetained");
        let closed = bridge.services.fs.close_open_descriptors(preserve_retained);
        Ok(IpcResult::ok(message, json!({ "closed": closed })))
    }));

    router.map("fs.constants", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.fs.constants()))
    }));
}

fn register_udp_routes(router: &mut Router) {
    router.map("udp.bind", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let address = message.get("address").unwrap_or("0.0.0.0");
        let port = message.get("port").and_then(|v| v.parse::<u16>().ok()).unwrap_or(0);
        let id = block_on(bridge.services.udp.bind(address, port))?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("udp.connect", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        let address = message
            .require_str("address")?
            .parse()
            .map_err(|_| RouteError::invalid_parameter("address"))?;
        bridge.services.udp.connect(id, address)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("udp.send", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        let to = message
            .get("address")
            .and_then(|v| v.parse().ok());
        let written = block_on(bridge.services.udp.send(id, &message.buffer, to))?;
        Ok(IpcResult::ok(message, json!({ "written": written })))
    }));

    router.map("udp.readStart", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.udp.set_reading(id, true)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("udp.readStop", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.udp.set_reading(id, false)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("udp.close", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.udp.close(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));
}

fn register_process_routes(router: &mut Router) {
    router.map("child_process.spawn", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let command = message.require_str("command")?;
        let args = message.get_array("args");
        let cwd = message.get("cwd");
        let id = bridge.services.process.spawn(command, &args, cwd)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("child_process.write", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        block_on(bridge.services.process.write(id, &message.buffer))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("child_process.kill", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.process.kill(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("child_process.exec", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let command = message.require_str("command")?;
        let args = message.get_array("args");
        let cwd = message.get("cwd");
        let timeout = message
            .get("timeout")
            .and_then(|v| v.parse::<u64>().ok())
            .map(std::time::Duration::from_millis);
        let kill_signal = message.get("killSignal").and_then(|v| v.parse::<i32>().ok());
        let outcome = block_on(bridge.services.process.exec(command, &args, cwd, timeout, kill_signal))?;
        let queued = crate::result::QueuedResponse::octet_stream(bridge.ids.next(), outcome.stdout);
        let response_id = queued.id;
        bridge.queued_responses.insert(queued.clone());
        Ok(IpcResult::ok_with_queued(
            message,
            json!({
                "id": response_id,
                "stderr": String::from_utf8_lossy(&outcome.stderr),
                "exitCode": outcome.exit_code,
            }),
            queued,
        ))
    }));
}

fn register_timer_routes(router: &mut Router) {
    router.map("timers.setTimeout", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let millis = message.require_u64("timeout")?;
        let id = bridge.services.timers.set_timeout(millis);
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("timers.clearTimeout", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.timers.clear(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));
}

fn register_dns_routes(router: &mut Router) {
    let handler: crate::router::RouteHandler = std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let hostname = message.require_str("hostname")?;
        let addrs = block_on(bridge.services.dns.lookup(hostname))?;
        let addrs: Vec<String> = addrs.iter().map(ToString::to_string).collect();
        Ok(IpcResult::ok(message, json!({ "addresses": addrs })))
    });
    router.map_aliases(&["dns.lookup", "dnsLookup"], handler);
}

fn register_os_platform_routes(router: &mut Router) {
    router.map("os.uptime", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.os.uptime()))
    }));

    router.map("os.hrtime", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.os.hrtime()))
    }));

    router.map("os.uname", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.os.uname()))
    }));

    router.map("os.rusage", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.os.rusage()))
    }));

    router.map("os.availableMemory", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, json!({ "bytes": bridge.services.os.available_memory() })))
    }));

    router.map("os.paths", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.os.paths()))
    }));

    router.map("os.bufferSize", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, json!({ "bytes": bridge.services.os.buffer_size() })))
    }));

    router.map("os.constants", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.os.constants()))
    }));

    router.map("os.networkInterfaces", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        Ok(IpcResult::ok(message, bridge.services.os.network_interfaces()))
    }));

    router.map("platform.event", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let event = message.require_str("value")?;
        bridge
            .services
            .platform
            .set_env("APP_RUNTIME_LAST_PLATFORM_EVENT", event);
        Ok(IpcResult::ok(message, json!({})))
    }));
}

fn register_notification_permission_routes(router: &mut Router) {
    router.map("notifications.show", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let title = message.require_str("title")?;
        let body = message.get_str("body");
        let id = bridge.services.notifications.show(title, body);
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("permissions.query", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let name = message.require_str("name")?;
        Ok(IpcResult::ok(message, json!({ "state": bridge.services.permissions.query(name).as_str() })))
    }));

    router.map("permissions.request", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let name = message.require_str("name")?;
        Ok(IpcResult::ok(message, json!({ "state": bridge.services.permissions.request(name).as_str() })))
    }));
}

fn register_broadcast_geolocation_routes(router: &mut Router) {
    router.map("broadcast_channel.subscribe", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let name = message.require_str("name")?;
        bridge.services.broadcast_channel.subscribe(name, bridge.window_index);
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("broadcast_channel.unsubscribe", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let name = message.require_str("name")?;
        bridge.services.broadcast_channel.unsubscribe(name, bridge.window_index);
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("broadcast_channel.postMessage", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let name = message.require_str("name")?;
        let recipients = bridge.services.broadcast_channel.post(name, bridge.window_index, &json!({}));
        if recipients.is_empty() {
            return Err(RouteError::not_found(format!("no subscribers for '{name}'")));
        }
        Ok(IpcResult::ok(message, json!({ "recipients": recipients })))
    }));

    router.map("geolocation.getCurrentPosition", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        match bridge.services.geolocation.current_position() {
            Some(position) => Ok(IpcResult::ok(message, position.to_json())),
            None => Err(RouteError::not_supported("no position available")),
        }
    }));
}

fn register_ai_routes(router: &mut Router) {
    router.map("ai.llm.model.load", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let path = message.require_str("path")?;
        let id = bridge.services.ai.model_load(path)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("ai.llm.model.unload", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.ai.model_unload(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("ai.llm.context.create", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let model_id = message.require_u64("modelId")?;
        let id = bridge.services.ai.context_create(model_id)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("ai.llm.context.destroy", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.services.ai.context_destroy(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("ai.llm.lora.load", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let filename = message.require_str("filename")?;
        let id = bridge.services.ai.lora_load(filename)?;
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("ai.llm.lora.attach", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let context_id = message.require_u64("contextId")?;
        let lora_id = message.require_u64("loraId")?;
        bridge.services.ai.lora_attach(context_id, lora_id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("ai.llm.lora.detach", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let context_id = message.require_u64("contextId")?;
        let lora_id = message.require_u64("loraId")?;
        bridge.services.ai.lora_detach(context_id, lora_id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));
}

fn register_service_worker_routes(router: &mut Router) {
    router.map("serviceWorker.register", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let scheme = message.get_str("scheme");
        let scope = message.get_str("scope");
        let script_url = message.require_str("scriptURL")?;
        let id = bridge.service_workers.register(scheme, scope, script_url);
        Ok(IpcResult::ok(message, json!({ "id": id })))
    }));

    router.map("serviceWorker.unregister", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.service_workers.unregister(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("serviceWorker.skipWaiting", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        bridge.service_workers.skip_waiting(id)?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("serviceWorker.fetch", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let scheme = message.get_str("scheme");
        let pathname = message.get_str("pathname");
        let registration_id = bridge
            .service_workers
            .resolve(scheme, pathname)
            .ok_or_else(|| RouteError::not_found("no service worker registration covers this scope"))?;
        let fetch_id = bridge.service_workers.allocate_fetch(crate::serviceworker::FetchRequest {
            method: message.get_str("method").to_string(),
            host: message.get_str("host").to_string(),
            scheme: scheme.to_string(),
            pathname: pathname.to_string(),
            query: message.get_str("query").to_string(),
            headers: json!({}),
            client: message.get_str("client").to_string(),
        });
        Ok(IpcResult::ok(message, json!({ "id": fetch_id, "registrationId": registration_id })))
    }));

    // `serviceWorker.fetch.response` completes the fetch the worker was
    // handed by `serviceWorker.fetch`, then hands the response body back to
    // the original requester through the same consume-once `QueuedResponse`
    // mechanism `fs.read`/`child_process.exec` use, since this crate has no
    // separate continuation/conduit machinery to reply to a different
    // caller than the one that issued the request (spec §4.2.5 step 2).
    router.map("serviceWorker.fetch.response", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        let status_code = message.get("statusCode").and_then(|v| v.parse::<u16>().ok()).unwrap_or(200);
        let headers = match message.get("headers") {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw).unwrap_or_else(|_| json!({})),
            _ => json!({}),
        };
        let response = bridge.service_workers.complete_fetch(
            id,
            crate::serviceworker::FetchResponse {
                status_code,
                headers,
                body: message.buffer.clone(),
            },
        )?;
        let queued = crate::result::QueuedResponse::octet_stream(bridge.ids.next(), response.body);
        let response_id = queued.id;
        bridge.queued_responses.insert(queued.clone());
        Ok(IpcResult::ok_with_queued(
            message,
            json!({ "id": response_id, "statusCode": response.status_code }),
            queued,
        ))
    }));
}

/// `queuedResponse?id=` is the other half of every `QueuedResponse` hand-
/// off (`fs.read`, `child_process.exec`, `serviceWorker.fetch.response`):
/// it consumes the body exactly once and returns it as the reply's own
/// out-of-band payload (spec §3 invariant d).
fn register_protocol_routes(router: &mut Router) {
    router.map("protocol.register", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let scheme = message.require_str("scheme")?;
        let root = message.require_str("root")?;
        bridge
            .services
            .protocols
            .register(scheme, Box::new(crate::protocol::FileRequestHandler::new(root)));
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("protocol.unregister", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let scheme = message.require_str("scheme")?;
        bridge.services.protocols.unregister(scheme);
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("protocol.getData", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let scheme = message.require_str("scheme")?;
        let data = bridge.services.protocols.data(scheme, &bridge.service_workers);
        Ok(IpcResult::ok(message, json!({ "data": data })))
    }));

    router.map("protocol.setData", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let scheme = message.require_str("scheme")?;
        let raw = message.get_str("data");
        let data = if raw.is_empty() { json!({}) } else {
            serde_json::from_str(raw).map_err(|_| RouteError::invalid_parameter("data"))?
        };
        bridge.service_workers.set_protocol_data(scheme, data);
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("protocol.getServiceWorkerRegistration", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let scheme = message.require_str("scheme")?;
        let registration_id = bridge.service_workers.protocol_registration(scheme);
        Ok(IpcResult::ok(message, json!({ "registrationId": registration_id })))
    }));
}

fn register_queued_response_routes(router: &mut Router) {
    router.map("queuedResponse", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let id = message.require_u64("id")?;
        let response = bridge
            .queued_responses
            .take(id)
            .ok_or_else(|| RouteError::not_found(format!("no queued response {id}")))?;
        Ok(IpcResult::ok_with_queued(message, json!({ "length": response.length }), response))
    }));
}

/// `index` defaults to the dispatching window's own index, so self-
/// targeting ops (`show`, `close`, `setTitle`, ...) don't need to repeat it.
fn target_index(bridge: &Bridge, message: &Message) -> i32 {
    message
        .get("index")
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(bridge.window_index)
}

/// Locks the `WindowManager` behind `bridge.windows` just long enough to
/// run `f`, matching spec §9's prescription that the manager is reached
/// through a `Weak` handle and never held across a dispatch.
fn with_windows<T>(
    bridge: &Bridge,
    f: impl FnOnce(&mut crate::window::WindowManager) -> Result<T, crate::error::Error>,
) -> Result<T, RouteError> {
    let windows = bridge
        .windows
        .upgrade()
        .ok_or_else(|| RouteError::internal("window manager is no longer available"))?;
    let mut guard = windows.lock();
    f(&mut guard).map_err(RouteError::from)
}

fn register_window_routes(router: &mut Router) {
    router.map("window", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let (status, title) = with_windows(bridge, |windows| {
            let window = windows.get(index).ok_or(crate::error::Error::InvalidWindowIndex(index))?;
            Ok((format!("{:?}", window.status), window.options.title.clone()))
        })?;
        Ok(IpcResult::ok(message, json!({ "index": index, "status": status, "title": title })))
    }));

    router.map("window.create", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let mut options = crate::window::WindowOptions {
            url: message.get_str("url").to_string(),
            title: message.get_str("title").to_string(),
            ..crate::window::WindowOptions::default()
        };
        if let Some(width) = message.get("width").and_then(|v| v.parse().ok()) {
            options.width = width;
        }
        if let Some(height) = message.get("height").and_then(|v| v.parse().ok()) {
            options.height = height;
        }
        let requested_index = message.get("index").and_then(|v| v.parse::<i32>().ok()).unwrap_or(-1);
        let index = with_windows(bridge, |windows| {
            windows.create_window(requested_index, options, Box::new(crate::window::NullWebViewHost))
        })?;
        Ok(IpcResult::ok(message, json!({ "index": index })))
    }));

    router.map("window.close", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.close(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.show", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.show(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.hide", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.hide(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.maximize", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.maximize(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.minimize", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.minimize(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.restore", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.restore(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.navigate", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let url = message.require_str("url")?;
        with_windows(bridge, |windows| windows.navigate(index, url))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.eval", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let script = message.require_str("script")?;
        let value = with_windows(bridge, |windows| windows.eval(index, script))?;
        Ok(IpcResult::ok(message, json!({ "result": value })))
    }));

    router.map("window.send", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let target = message.require_i32("targetIndex")?;
        let event = message.require_str("event")?;
        let value = match message.get("value") {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| json!(raw)),
            None => json!(null),
        };
        with_windows(bridge, |windows| windows.send(target, event, &value))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.setTitle", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let title = message.require_str("title")?;
        with_windows(bridge, |windows| windows.set_title(index, title))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.getTitle", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let title = with_windows(bridge, |windows| windows.get_title(index))?;
        Ok(IpcResult::ok(message, json!({ "title": title })))
    }));

    router.map("window.setPosition", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let x = message.require_i32("x")?;
        let y = message.require_i32("y")?;
        with_windows(bridge, |windows| windows.set_position(index, x, y))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.setSize", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let width = message.get("width").and_then(|v| v.parse::<u32>().ok()).unwrap_or(1024);
        let height = message.get("height").and_then(|v| v.parse::<u32>().ok()).unwrap_or(768);
        with_windows(bridge, |windows| windows.set_size(index, width, height))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.setBackgroundColor", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let color = message.require_str("color")?;
        with_windows(bridge, |windows| windows.set_background_color(index, color))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.getBackgroundColor", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let color = with_windows(bridge, |windows| windows.get_background_color(index))?;
        Ok(IpcResult::ok(message, json!({ "color": color })))
    }));

    router.map("window.setContextMenu", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        let raw = message.require_str("items")?;
        let items: serde_json::Value = serde_json::from_str(raw).map_err(|_| RouteError::invalid_parameter("items"))?;
        with_windows(bridge, |windows| windows.set_context_menu(index, &items))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.showInspector", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.show_inspector(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));

    router.map("window.showFileSystemPicker", std::sync::Arc::new(|bridge: &Bridge, message: &Message| {
        let index = target_index(bridge, message);
        with_windows(bridge, |windows| windows.show_file_system_picker(index))?;
        Ok(IpcResult::ok(message, json!({})))
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use bytes::Bytes;

    #[test]
    fn ping_replies_pong() {
        let router = default_router();
        let bridge = Bridge::for_test();
        let message = Message::parse("ping?seq=1", Bytes::new());
        let result = router.dispatch(&bridge, &message);
        assert_eq!(result.to_wire()["data"], json!("pong"));
    }

    #[test]
    fn fs_open_read_write_close_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        let router = default_router();
        let bridge = Bridge::for_test();

        let open = Message::parse(
            &format!("fs.open?seq=1&path={}&flags=577&mode=420", crate::url::encode_uri_component(path.to_str().unwrap())),
            Bytes::new(),
        );
        let opened = router.dispatch(&bridge, &open);
        let id = opened.to_wire()["data"]["id"].as_u64().unwrap();

        let write = Message::parse(&format!("fs.write?seq=2&id={id}"), Bytes::from_static(b"hi"));
        router.dispatch(&bridge, &write);

        let close = Message::parse(&format!("fs.close?seq=3&id={id}"), Bytes::new());
        let closed = router.dispatch(&bridge, &close);
        assert!(!closed.is_err());
    }

    #[test]
    fn notfound_route_reports_error_taxonomy() {
        let router = default_router();
        let bridge = Bridge::for_test();
        let message = Message::parse("nope?seq=1", Bytes::new());
        let result = router.dispatch(&bridge, &message);
        assert_eq!(result.to_wire()["err"]["type"], json!("NotFoundError"));
    }
}
