use foundation::LngLat;
use layers::{EngineKind, Measurement, MeasurementId};
use scene::{SiteId, SiteRecord};
use serde::Serialize;

use crate::readout::ScaleBar;
use crate::status::{Advisory, AdvisoryKind};

/// Notifications for the surrounding UI, drained once per tick.
///
/// Payloads are always well-formed data or `None`; errors never cross this
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    #[serde(rename_all = "camelCase")]
    SiteClick { record: Option<SiteRecord> },
    #[serde(rename_all = "camelCase")]
    SiteSelect { id: Option<SiteId>, multi_select: bool },
    #[serde(rename_all = "camelCase")]
    SelectionChanged { ids: Vec<SiteId> },
    #[serde(rename_all = "camelCase")]
    Hover { site: Option<SiteId> },
    #[serde(rename_all = "camelCase")]
    TooltipFrozen { site: SiteId },
    TooltipReleased,
    #[serde(rename_all = "camelCase")]
    MeasurePointAdd { coord: LngLat, snapped: bool },
    #[serde(rename_all = "camelCase")]
    MeasurementAdded { measurement: Measurement },
    #[serde(rename_all = "camelCase")]
    MeasurementRemoved { id: MeasurementId },
    MeasurementsCleared,
    #[serde(rename_all = "camelCase")]
    ProximitySet { coord: LngLat },
    ProximityCleared,
    LayersReady,
    #[serde(rename_all = "camelCase")]
    Cursor {
        lng_lat: Option<LngLat>,
        scale: Option<ScaleBar>,
    },
    #[serde(rename_all = "camelCase")]
    EngineSwitched { from: EngineKind, to: EngineKind },
    #[serde(rename_all = "camelCase")]
    Status { message: Option<String> },
    #[serde(rename_all = "camelCase")]
    Advisory { advisory: Advisory },
    #[serde(rename_all = "camelCase")]
    AdvisoryDismissed { kind: AdvisoryKind },
    LabelsReloadRequested,
}
