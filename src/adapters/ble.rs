//! BLE GATT telemetry transport.
//!
//! Implements [`TransportPort`] — measurement records go out as GATT
//! notifications, and a second characteristic mirrors the node's status for
//! consumers that only poll.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via `esp-idf-sys`.
//! - **all other targets**: simulation backend for host-side tests.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Perms         |
//! |----------------|----------------------------------------|---------------|
//! | Measurement    | `2c5d2e0b-51ae-470e-8a4a-657207292a04` | Read + Notify |
//! | Status         | `2c5d2e0c-51ae-470e-8a4a-657207292a04` | Read          |

use log::{info, warn};

use crate::app::events::StatusPayload;
use crate::app::ports::TransportPort;
use crate::error::CommsError;

// ── Constants ────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x50106842_26c7_4e08_a41e_dda4319c2fc5;
pub const CHAR_MEASUREMENT: u128 = 0x2c5d2e0b_51ae_470e_8a4a_657207292a04;
pub const CHAR_STATUS: u128 = 0x2c5d2e0c_51ae_470e_8a4a_657207292a04;

pub const DEVICE_NAME: &str = "MojCzujnikPowietrza";
#[cfg(target_os = "espidf")]
const DEVICE_NAME_C: &[u8] = b"MojCzujnikPowietrza\0";

/// Largest notification payload we will hand to the stack.
const MAX_NOTIFY_BYTES: usize = 512;

// ── ESP-IDF BLE static state ─────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These atomics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_MEAS_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_STATUS_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONNECTED: AtomicBool = AtomicBool::new(false);

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    esp_ble_gatts_add_char(
        svc_handle,
        &mut char_uuid,
        perm as esp_gatt_perm_t,
        prop as esp_gatt_char_prop_t,
        core::ptr::null_mut(),
        core::ptr::null_mut(),
    );
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let svc_uuid = uuid128_to_esp(SERVICE_UUID);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: svc_uuid,
                    inst_id: 0,
                },
                is_primary: true,
            };
            esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let p = &(*param).create;
            let svc_handle = p.service_handle;
            BLE_SVC_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            esp_ble_gatts_start_service(svc_handle);
            BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
            add_gatt_char(
                svc_handle,
                CHAR_MEASUREMENT,
                ESP_GATT_PERM_READ,
                ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
            );
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = &(*param).add_char;
            let handle = p.attr_handle;
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) {
                1 => {
                    BLE_MEAS_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: measurement char (handle={})", handle);
                    BLE_CHAR_STEP.store(2, AtomicOrdering::Relaxed);
                    add_gatt_char(
                        svc_handle,
                        CHAR_STATUS,
                        ESP_GATT_PERM_READ,
                        ESP_GATT_CHAR_PROP_BIT_READ,
                    );
                }
                2 => {
                    BLE_STATUS_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: status char (handle={})", handle);
                    esp_ble_gap_start_advertising(&mut default_adv_params());
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = &(*param).connect;
            BLE_CONN_ID.store(p.conn_id as u32, AtomicOrdering::Relaxed);
            BLE_CONNECTED.store(true, AtomicOrdering::Release);
            log::info!("BLE GATTS: consumer connected (conn_id={})", p.conn_id);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONNECTED.store(false, AtomicOrdering::Release);
            log::info!("BLE GATTS: consumer disconnected, re-advertising");
            esp_ble_gap_start_advertising(&mut default_adv_params());
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
fn default_adv_params() -> esp_idf_svc::sys::esp_ble_adv_params_t {
    use esp_idf_svc::sys::*;
    esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    }
}

// ── BLE Transport ────────────────────────────────────────────

/// GATT transport with a notify measurement characteristic and a readable
/// status characteristic.
pub struct BleTransport {
    #[cfg(not(target_os = "espidf"))]
    connected: bool,
    #[cfg(not(target_os = "espidf"))]
    pub sent: Vec<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    pub last_status: Option<StatusPayload>,
}

impl BleTransport {
    /// Bring up the Bluedroid stack, register the GATT application and
    /// start advertising. On host targets this is a no-op constructor.
    pub fn init() -> Result<Self, CommsError> {
        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;
            // SAFETY: called once from the main task before any other BT
            // use; the sequence is the canonical Bluedroid bring-up.
            unsafe {
                let mut bt_cfg: esp_bt_controller_config_t = core::mem::zeroed();
                bt_cfg.controller_task_stack_size = 4096;
                bt_cfg.controller_task_prio = 23;
                bt_cfg.ble_max_conn = 3;
                if esp_bt_controller_init(&mut bt_cfg) != ESP_OK
                    || esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE) != ESP_OK
                    || esp_bluedroid_init() != ESP_OK
                    || esp_bluedroid_enable() != ESP_OK
                {
                    return Err(CommsError::BleInitFailed);
                }
                esp_ble_gap_register_callback(Some(ble_gap_event_handler));
                esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
                esp_ble_gap_set_device_name(DEVICE_NAME_C.as_ptr() as *const _);
                if esp_ble_gatts_app_register(0) != ESP_OK {
                    return Err(CommsError::BleInitFailed);
                }
            }
            info!("BLE: GATT server registered as '{DEVICE_NAME}'");
            Ok(Self {})
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("BLE: simulation backend");
            Ok(Self {
                connected: false,
                sent: Vec::new(),
                last_status: None,
            })
        }
    }

    /// Simulation: flip the consumer-connected signal.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl TransportPort for BleTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), CommsError> {
        if payload.len() > MAX_NOTIFY_BYTES {
            warn!("BLE: payload {} bytes exceeds notify limit", payload.len());
            return Err(CommsError::NotifyFailed);
        }

        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;
            if !BLE_CONNECTED.load(AtomicOrdering::Acquire) {
                return Err(CommsError::NotConnected);
            }
            let gatts_if = BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8;
            let conn_id = BLE_CONN_ID.load(AtomicOrdering::Relaxed) as u16;
            let handle = BLE_MEAS_CHAR_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            // SAFETY: the stack copies the buffer before returning.
            let ret = unsafe {
                esp_ble_gatts_send_indicate(
                    gatts_if,
                    conn_id,
                    handle,
                    payload.len() as u16,
                    payload.as_ptr() as *mut u8,
                    false, // notification, no ack
                )
            };
            if ret != ESP_OK {
                return Err(CommsError::NotifyFailed);
            }
            Ok(())
        }

        #[cfg(not(target_os = "espidf"))]
        {
            if !self.connected {
                return Err(CommsError::NotConnected);
            }
            self.sent.push(payload.to_vec());
            Ok(())
        }
    }

    fn is_connected(&self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            BLE_CONNECTED.load(AtomicOrdering::Acquire)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.connected
        }
    }

    fn publish_status(&mut self, status: &StatusPayload) {
        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;
            let Ok(bytes) = serde_json::to_vec(status) else {
                return;
            };
            let handle = BLE_STATUS_CHAR_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            if handle == 0 {
                return; // GATT table not built yet
            }
            // SAFETY: set_attr_value copies the buffer.
            unsafe {
                esp_ble_gatts_set_attr_value(handle, bytes.len() as u16, bytes.as_ptr());
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.last_status = Some(status.clone());
        }
    }
}
