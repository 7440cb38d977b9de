//! Browser facade over the globe controller.
//!
//! The page owns both render loops. It forwards input and engine lifecycle
//! notifications here, calls [`tick`] once per animation frame, and applies
//! what comes back: UI events, tile-engine commands and the sphere camera.
//! Boundary fetches are issued from here and fed back on completion.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use foundation::{LngLat, Time};
use gloo_net::http::Request as HttpRequest;
use globe::{
    AdvisoryKind, GlobeConfig, GlobeController, GlobeView, SphereFrame, TileCommand, TilePose, ToolMode, UiEvent,
};
use layers::{
    BaseLayer, ColorMode, EngineKind, LabelCategory, LabelDraw, LabelSpec, MarkerSet, MeasurementId, OverlayKind,
    OverlayPrimitive,
};
use scene::{SiteId, SiteRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use streaming::{BoundaryError, FetchCommand, Request};
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{AbortController, AbortSignal};

mod console;

// Guard to prevent double-initialization of global state (relevant during hot reload).
static INITIALIZED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_SET: OnceLock<()> = OnceLock::new();

thread_local! {
    static CONTROLLER: RefCell<Option<GlobeController>> = const { RefCell::new(None) };
    static IN_FLIGHT: RefCell<BTreeMap<Request, AbortController>> = const { RefCell::new(BTreeMap::new()) };
}

fn init_panic_hook() {
    PANIC_HOOK_SET.get_or_init(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = info.to_string();
            web_sys::console::error_1(&JsValue::from_str(&msg));
        }));
    });
}

/// Runs `f` against the live controller. Fails before [`init`] and during
/// thread-local teardown instead of panicking.
fn with_controller<R>(f: impl FnOnce(&mut GlobeController) -> R) -> Result<R, JsValue> {
    CONTROLLER
        .try_with(|cell| cell.borrow_mut().as_mut().map(f))
        .ok()
        .flatten()
        .ok_or_else(|| JsValue::from_str("globe controller not initialised"))
}

fn now() -> Time {
    let ms = web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now);
    Time::from_millis(ms)
}

fn parse<T: DeserializeOwned>(what: &str, json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("invalid {what}: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn engine_kind(s: &str) -> Result<EngineKind, JsValue> {
    match s.trim().to_ascii_lowercase().as_str() {
        "sphere" => Ok(EngineKind::Sphere),
        "tile" => Ok(EngineKind::Tile),
        other => Err(JsValue::from_str(&format!("unknown engine {other:?}"))),
    }
}

fn check_finite(args: &[f64], op: &str) -> Result<(), String> {
    if args.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(format!("{op} args must be finite"))
    }
}

fn finite(args: &[f64], op: &str) -> Result<(), JsValue> {
    check_finite(args, op).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Avoid double-initialization (can happen during hot-reload edge cases).
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    init_panic_hook();
    console::init_tracing("info");
    Ok(())
}

/// Creates the controller. An empty or invalid `config_json` falls back to
/// the defaults.
#[wasm_bindgen]
pub fn init(config_json: &str, log_directives: &str) -> Result<(), JsValue> {
    let directives = log_directives.trim();
    if !directives.is_empty() {
        match console::set_directives(directives) {
            Ok(()) => debug!(directives, "log filter updated"),
            Err(err) => warn!(directives, error = %err, "log directives rejected; keeping previous filter"),
        }
    }
    let config = if config_json.trim().is_empty() {
        GlobeConfig::default()
    } else {
        GlobeConfig::from_json_str(config_json).unwrap_or_else(|err| {
            warn!(error = %err, "globe config rejected; using defaults");
            GlobeConfig::default()
        })
    };
    let controller = GlobeController::new(config, now());
    CONTROLLER
        .try_with(|cell| *cell.borrow_mut() = Some(controller))
        .map_err(|_| JsValue::from_str("controller storage unavailable"))?;
    info!("globe controller initialised");
    Ok(())
}

// ---- frame ---------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameOut {
    primary: EngineKind,
    transitioning: bool,
    view: GlobeView,
    sphere: SphereFrame,
    events: Vec<UiEvent>,
    tile_commands: Vec<TileCommand>,
}

/// Advances one frame at the page's animation timestamp and returns what
/// the page must apply, as JSON.
#[wasm_bindgen]
pub fn tick(now_ms: f64) -> Result<String, JsValue> {
    finite(&[now_ms], "tick")?;
    let (out, fetches) = with_controller(|c| {
        c.tick(Time::from_millis(now_ms));
        let out = FrameOut {
            primary: c.primary(),
            transitioning: c.state().mode.is_transitioning(),
            view: c.view(),
            sphere: c.sphere().frame(),
            events: c.take_events(),
            tile_commands: c.take_tile_commands(),
        };
        (out, c.take_fetch_commands())
    })?;
    dispatch_fetches(fetches);
    to_json(&out)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SphereGeometry<'a> {
    generation: u64,
    markers: Option<&'a MarkerSet>,
    overlays: &'a BTreeMap<OverlayKind, Vec<OverlayPrimitive>>,
    labels: &'a [LabelDraw],
}

/// Sphere markers, overlays and labels. The page re-uploads only when
/// `generation` differs from the one it last drew.
#[wasm_bindgen]
pub fn sphere_geometry() -> Result<String, JsValue> {
    with_controller(|c| {
        let sphere = c.sphere();
        to_json(&SphereGeometry {
            generation: sphere.generation(),
            markers: globe::EngineAdapter::markers(sphere),
            overlays: sphere.overlays(),
            labels: sphere.labels(),
        })
    })?
}

// ---- boundary fetches ----------------------------------------------------

async fn fetch_text(url: &str, signal: Option<&AbortSignal>) -> Result<String, BoundaryError> {
    let resp = HttpRequest::get(url)
        .abort_signal(signal)
        .send()
        .await
        .map_err(|e| BoundaryError::Fetch(e.to_string()))?;
    if !resp.ok() {
        return Err(BoundaryError::Status(resp.status()));
    }
    resp.text().await.map_err(|e| BoundaryError::Fetch(e.to_string()))
}

fn complete_fetch(request: Request, outcome: Result<String, BoundaryError>) {
    let _ = IN_FLIGHT.try_with(|m| m.borrow_mut().remove(&request));
    let result = with_controller(|c| match outcome {
        Ok(text) => c.boundary_response(request, Ok(text.as_str()), now()),
        Err(err) => c.boundary_response(request, Err(err), now()),
    });
    if result.is_err() {
        warn!(?request, "boundary response arrived after teardown");
    }
}

/// Starts fetches and cancels superseded ones on the network. An aborted
/// fetch still completes with an error, which the loader discards by token.
fn dispatch_fetches(commands: Vec<FetchCommand>) {
    for command in commands {
        match command {
            FetchCommand::Start { request, key, url } => {
                debug!(?request, %url, empire = %key.empire_id, year = key.year, "boundary fetch");
                let controller = AbortController::new().ok();
                let signal = controller.as_ref().map(AbortController::signal);
                if let Some(controller) = controller {
                    let _ = IN_FLIGHT.try_with(|m| m.borrow_mut().insert(request, controller));
                }
                spawn_local(async move {
                    let outcome = fetch_text(&url, signal.as_ref()).await;
                    complete_fetch(request, outcome);
                });
            }
            FetchCommand::Abort { request } => {
                let controller = IN_FLIGHT.try_with(|m| m.borrow_mut().remove(&request)).ok().flatten();
                match controller {
                    Some(controller) => {
                        controller.abort();
                        debug!(?request, "boundary fetch aborted");
                    }
                    None => debug!(?request, "boundary fetch already settled"),
                }
            }
        }
    }
}

// ---- camera --------------------------------------------------------------

#[wasm_bindgen]
pub fn set_viewport(width_px: f64, height_px: f64) -> Result<(), JsValue> {
    finite(&[width_px, height_px], "set_viewport")?;
    with_controller(|c| c.set_viewport(width_px, height_px))
}

#[wasm_bindgen]
pub fn set_view(latitude: f64, longitude: f64, zoom_percent: f64) -> Result<(), JsValue> {
    finite(&[latitude, longitude, zoom_percent], "set_view")?;
    with_controller(|c| c.set_view(GlobeView::new(latitude, longitude, zoom_percent)))
}

#[wasm_bindgen]
pub fn set_zoom_percent(zoom_percent: f64) -> Result<(), JsValue> {
    finite(&[zoom_percent], "set_zoom_percent")?;
    with_controller(|c| c.set_zoom_percent(zoom_percent))
}

#[wasm_bindgen]
pub fn zoom_by(delta_percent: f64) -> Result<(), JsValue> {
    finite(&[delta_percent], "zoom_by")?;
    with_controller(|c| c.zoom_by(delta_percent))
}

#[wasm_bindgen]
pub fn fly_to(longitude: f64, latitude: f64, zoom_percent: f64, duration_ms: u32) -> Result<(), JsValue> {
    finite(&[longitude, latitude, zoom_percent], "fly_to")?;
    with_controller(|c| c.fly_to(LngLat::new(longitude, latitude), zoom_percent, u64::from(duration_ms), now()))
}

#[wasm_bindgen]
pub fn view() -> Result<String, JsValue> {
    with_controller(|c| to_json(&c.view()))?
}

// ---- pointer input -------------------------------------------------------

#[wasm_bindgen]
pub fn pointer_down(engine: &str, x_px: f64, y_px: f64) -> Result<(), JsValue> {
    finite(&[x_px, y_px], "pointer_down")?;
    let engine = engine_kind(engine)?;
    with_controller(|c| c.pointer_down(engine, [x_px, y_px], now()))
}

#[wasm_bindgen]
pub fn pointer_move(engine: &str, x_px: f64, y_px: f64) -> Result<(), JsValue> {
    finite(&[x_px, y_px], "pointer_move")?;
    let engine = engine_kind(engine)?;
    with_controller(|c| c.pointer_move(engine, [x_px, y_px], now()))
}

#[wasm_bindgen]
pub fn pointer_up(engine: &str, x_px: f64, y_px: f64) -> Result<(), JsValue> {
    finite(&[x_px, y_px], "pointer_up")?;
    let engine = engine_kind(engine)?;
    with_controller(|c| c.pointer_up(engine, [x_px, y_px], now()))
}

#[wasm_bindgen]
pub fn click(engine: &str, x_px: f64, y_px: f64, multi_select: bool) -> Result<(), JsValue> {
    finite(&[x_px, y_px], "click")?;
    let engine = engine_kind(engine)?;
    with_controller(|c| c.click(engine, [x_px, y_px], multi_select))
}

#[wasm_bindgen]
pub fn dismiss_tooltip() -> Result<(), JsValue> {
    with_controller(|c| c.dismiss_tooltip())
}

/// `tool_json` is `"normal"`, `"measuring"` or `"proximityPicking"`.
#[wasm_bindgen]
pub fn set_tool(tool_json: &str) -> Result<(), JsValue> {
    let tool: ToolMode = parse("tool", tool_json)?;
    with_controller(|c| c.set_tool(tool))
}

// ---- data ----------------------------------------------------------------

#[wasm_bindgen]
pub fn set_records(records_json: &str) -> Result<(), JsValue> {
    let records: Vec<SiteRecord> = parse("records", records_json)?;
    with_controller(|c| c.set_records(records))
}

#[wasm_bindgen]
pub fn set_color_mode(mode_json: &str) -> Result<(), JsValue> {
    let mode: ColorMode = parse("color mode", mode_json)?;
    with_controller(|c| c.set_color_mode(mode))
}

#[wasm_bindgen]
pub fn set_satellite(satellite: bool) -> Result<(), JsValue> {
    with_controller(|c| c.set_satellite(satellite))
}

#[wasm_bindgen]
pub fn set_labels(labels_json: &str) -> Result<(), JsValue> {
    let labels: Vec<LabelSpec> = parse("labels", labels_json)?;
    with_controller(|c| c.set_labels(labels, now()))
}

#[wasm_bindgen]
pub fn set_label_category_enabled(category_json: &str, enabled: bool) -> Result<(), JsValue> {
    let category: LabelCategory = parse("label category", category_json)?;
    with_controller(|c| c.set_label_category_enabled(category, enabled, now()))
}

/// `active_json` maps empire id to the year to show, e.g. `{"rome": 117}`.
#[wasm_bindgen]
pub fn set_active_empires(active_json: &str) -> Result<(), JsValue> {
    let active: BTreeMap<String, i32> = parse("active empires", active_json)?;
    let fetches = with_controller(|c| {
        c.set_active_empires(active, now());
        c.take_fetch_commands()
    })?;
    dispatch_fetches(fetches);
    Ok(())
}

#[wasm_bindgen]
pub fn sites_within_empires() -> Result<String, JsValue> {
    with_controller(|c| to_json(&c.sites_within_empires()))?
}

// ---- measurements, proximity, selection ----------------------------------

#[wasm_bindgen]
pub fn remove_measurement(id: u32) -> Result<bool, JsValue> {
    with_controller(|c| c.remove_measurement(MeasurementId(u64::from(id))))
}

#[wasm_bindgen]
pub fn clear_measurements() -> Result<(), JsValue> {
    with_controller(|c| c.clear_measurements())
}

#[wasm_bindgen]
pub fn set_proximity_radius(radius_km: f64) -> Result<(), JsValue> {
    with_controller(|c| c.set_proximity_radius(radius_km))
}

#[wasm_bindgen]
pub fn clear_proximity() -> Result<(), JsValue> {
    with_controller(|c| c.clear_proximity())
}

#[wasm_bindgen]
pub fn set_selection(ids_json: &str) -> Result<(), JsValue> {
    let ids: Vec<SiteId> = parse("selection", ids_json)?;
    with_controller(|c| c.set_selection(ids))
}

#[wasm_bindgen]
pub fn set_highlighted(id: Option<String>) -> Result<(), JsValue> {
    with_controller(|c| c.set_highlighted(id.map(SiteId::new)))
}

// ---- engine lifecycle ----------------------------------------------------

#[wasm_bindgen]
pub fn tile_ready() -> Result<(), JsValue> {
    with_controller(|c| c.tile_ready())
}

#[wasm_bindgen]
pub fn tile_failed(reason: &str) -> Result<(), JsValue> {
    with_controller(|c| c.tile_failed(reason))
}

/// Camera reported by the map library after it moved.
#[wasm_bindgen]
pub fn tile_camera_changed(longitude: f64, latitude: f64, zoom: f64) -> Result<(), JsValue> {
    finite(&[longitude, latitude, zoom], "tile_camera_changed")?;
    with_controller(|c| {
        c.tile_camera_changed(TilePose {
            center: LngLat::new(longitude, latitude),
            zoom,
        })
    })
}

#[wasm_bindgen]
pub fn context_lost() -> Result<(), JsValue> {
    with_controller(|c| c.context_lost())
}

#[wasm_bindgen]
pub fn context_restored() -> Result<(), JsValue> {
    with_controller(|c| c.context_restored())
}

#[wasm_bindgen]
pub fn report_software_rendering() -> Result<(), JsValue> {
    with_controller(|c| c.report_software_rendering())
}

#[wasm_bindgen]
pub fn dismiss_advisory(kind_json: &str) -> Result<(), JsValue> {
    let kind: AdvisoryKind = parse("advisory kind", kind_json)?;
    with_controller(|c| c.dismiss_advisory(kind))
}

#[wasm_bindgen]
pub fn base_layer_loaded(layer_json: &str, loaded: bool) -> Result<(), JsValue> {
    let layer: BaseLayer = parse("base layer", layer_json)?;
    with_controller(|c| c.base_layer_loaded(layer, loaded))
}
