//! Service and negative response code tables.
//!
//! Display-only data. Nothing in the decode path consults these.

/// One row of a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: u8,
    /// Short symbolic name, e.g. `READ_BY_ID`.
    pub name: &'static str,
    pub description: &'static str,
}

impl CodeEntry {
    const fn new(code: u8, name: &'static str, description: &'static str) -> Self {
        Self {
            code,
            name,
            description,
        }
    }
}

/// UDS services, plus the OBD-II modes and GMLAN extensions seen on real buses.
pub static SERVICES: &[CodeEntry] = &[
    CodeEntry::new(0x01, "OBDII_SHOW_CURRENT", "OBDII - Show current data"),
    CodeEntry::new(0x02, "OBDII_SHOW_FREEZE", "OBDII - Show freeze data"),
    CodeEntry::new(0x03, "OBDII_SHOW_STORED_DTC", "OBDII - Show stored DTC codes"),
    CodeEntry::new(0x04, "OBDII_CLEAR_DTC", "OBDII - Clear current DTC codes"),
    CodeEntry::new(0x05, "OBDII_TEST_O2", "OBDII - O2 sensor testing"),
    CodeEntry::new(0x06, "OBDII_TEST_RESULTS", "OBDII - Show emissions testing results"),
    CodeEntry::new(0x07, "OBDII_SHOW_PENDING_DTC", "OBDII - Show pending DTC codes"),
    CodeEntry::new(0x08, "OBDII_CONTROL_DEVICES", "OBDII - Control vehicle devices"),
    CodeEntry::new(0x09, "OBDII_VEH_INFO", "OBDII - Retrieve vehicle information"),
    CodeEntry::new(0x0A, "OBDII_PERM_DTC", "OBDII - Show permanent DTC codes"),
    CodeEntry::new(0x10, "DIAG_CONTROL", "Diagnostic session control"),
    CodeEntry::new(0x11, "ECU_RESET", "Reset ECU"),
    CodeEntry::new(0x12, "GMLAN_READ_FAILURE_RECORD", "GMLAN - Read Fail"),
    CodeEntry::new(0x14, "CLEAR_DIAG", "Clear diagnostic trouble codes"),
    CodeEntry::new(0x19, "READ_DTC", "Read diagnostic trouble codes"),
    CodeEntry::new(0x1A, "GMLAN_READ_DIAGNOSTIC_ID", "GMLAN - Read diagnostics ID"),
    CodeEntry::new(0x20, "RETURN_TO_NORMAL", "Return to normal mode"),
    CodeEntry::new(0x22, "READ_BY_ID", "Read data by ID"),
    CodeEntry::new(0x23, "READ_BY_ADDR", "Read data by address"),
    CodeEntry::new(0x24, "READ_SCALING_ID", "Read scaling data by ID"),
    CodeEntry::new(0x27, "SECURITY_ACCESS", "Request security access"),
    CodeEntry::new(0x28, "COMM_CTRL", "Communication control"),
    CodeEntry::new(0x2A, "READ_DATA_ID_PERIODIC", "Read data by ID periodically"),
    CodeEntry::new(0x2C, "DYNAMIC_DATA_DEFINE", "Create dynamic data ID"),
    CodeEntry::new(0x2D, "DEFINE_PID_BY_ADDR", "Create a PID for a given memory address"),
    CodeEntry::new(0x2E, "WRITE_BY_ID", "Write data by ID"),
    CodeEntry::new(0x2F, "IO_CTRL", "Input/Output control (force)"),
    CodeEntry::new(0x31, "ROUTINE_CTRL", "Call a service routine"),
    CodeEntry::new(0x34, "REQUEST_DOWNLOAD", "Request data download (from PC to ECU)"),
    CodeEntry::new(0x35, "REQUEST_UPLOAD", "Request data upload (from ECU to PC)"),
    CodeEntry::new(0x36, "TRANSFER_DATA", "Transfer data"),
    CodeEntry::new(0x37, "REQ_TRANS_EXIT", "Request that data transfer cease"),
    CodeEntry::new(0x38, "REQ_FILE_TRANS", "Request file transfer"),
    CodeEntry::new(0x3B, "GMLAN_WRITE_DID", "GMLAN - Write DID"),
    CodeEntry::new(0x3D, "WRITE_BY_ADDR", "Write data by address"),
    CodeEntry::new(0x3E, "TESTER_PRESENT", "Tester is present"),
    CodeEntry::new(0x7F, "NEG_RESPONSE", "Negative Response"),
    CodeEntry::new(0x83, "ACCESS_TIMING", "Read or write comm timing parameters"),
    CodeEntry::new(0x84, "SECURED_DATA_TRANS", "Secured data transmission"),
    CodeEntry::new(0x85, "CTRL_DTC_SETTINGS", "Control DTC settings"),
    CodeEntry::new(0x86, "RESPONSE_ON_EVENT", "Request start/stop transmission on event"),
    CodeEntry::new(0x87, "RESPONSE_LINK_CTRL", "Control comm link"),
    CodeEntry::new(0xA2, "GMLAN_REPORT_PROG_STATE", "GMLAN - Report programming state"),
    CodeEntry::new(0xA5, "GMLAN_ENTER_PROG_MODE", "GMLAN - Enter programming mode"),
    CodeEntry::new(0xA9, "GMLAN_CHECK_CODES", "GMLAN - Check codes"),
    CodeEntry::new(0xAA, "GMLAN_READ_DPID", "GMLAN - Read dynamic PID"),
    CodeEntry::new(0xAE, "GMLAN_DEVICE_CTRL", "GMLAN - Device control"),
    CodeEntry::new(0xFF, "UNKNOWN_CODE", "Unknown, likely proprietary UDS function code"),
];

/// Negative response codes (ISO 14229-1 annex A).
pub static NEGATIVE_RESPONSES: &[CodeEntry] = &[
    CodeEntry::new(0x10, "GENERAL_REJECT", "General rejection (no other codes matched)"),
    CodeEntry::new(0x11, "SERVICE_NOTSUPP", "ECU does not support this service code"),
    CodeEntry::new(0x12, "SUBFUNCT_NOTSUPP", "ECU does not support the requested sub function"),
    CodeEntry::new(0x13, "INVALID_FORMAT", "Invalid request length or format error"),
    CodeEntry::new(0x14, "RESPONSE_TOOLONG", "Response would be too long to send"),
    CodeEntry::new(0x21, "BUSY", "ECU is busy. Try again later"),
    CodeEntry::new(0x22, "COND_INCORR", "A prereq. condition was not met"),
    CodeEntry::new(0x24, "REQ_SEQ_ERR", "Invalid sequence of requests"),
    CodeEntry::new(0x25, "SUBNET_NORESP", "ECU tried to gateway request but response timed out"),
    CodeEntry::new(0x26, "FAILURE", "A failure (indicated in a DTC) is preventing a reply"),
    CodeEntry::new(0x31, "REQ_OUTOFRANGE", "A parameter is outside of the valid range"),
    CodeEntry::new(0x33, "SECURITY_DENIED", "Security access was denied. (invalid seq or ECU not unlocked?)"),
    CodeEntry::new(0x35, "INVALID_KEY", "Key passed was invalid. Failure counter has been incremented."),
    CodeEntry::new(0x36, "EXCEED_ATTEMPTS", "Key failed too many times. ECU security access locked out"),
    CodeEntry::new(0x37, "TIMEDELAY", "Security access too soon after last attempt"),
    CodeEntry::new(0x38, "EXT_SECUR_1", "Extended security failure code 1"),
    CodeEntry::new(0x39, "EXT_SECUR_2", "Extended security failure code 2"),
    CodeEntry::new(0x3A, "EXT_SECUR_3", "Extended security failure code 3"),
    CodeEntry::new(0x3B, "EXT_SECUR_4", "Extended security failure code 4"),
    CodeEntry::new(0x3C, "EXT_SECUR_5", "Extended security failure code 5"),
    CodeEntry::new(0x3D, "EXT_SECUR_6", "Extended security failure code 6"),
    CodeEntry::new(0x3E, "EXT_SECUR_7", "Extended security failure code 7"),
    CodeEntry::new(0x3F, "EXT_SECUR_8", "Extended security failure code 8"),
    CodeEntry::new(0x40, "EXT_SECUR_9", "Extended security failure code 9"),
    CodeEntry::new(0x41, "EXT_SECUR_10", "Extended security failure code 10"),
    CodeEntry::new(0x42, "EXT_SECUR_11", "Extended security failure code 11"),
    CodeEntry::new(0x43, "EXT_SECUR_12", "Extended security failure code 12"),
    CodeEntry::new(0x44, "EXT_SECUR_13", "Extended security failure code 13"),
    CodeEntry::new(0x45, "EXT_SECUR_14", "Extended security failure code 14"),
    CodeEntry::new(0x46, "EXT_SECUR_15", "Extended security failure code 15"),
    CodeEntry::new(0x47, "EXT_SECUR_16", "Extended security failure code 16"),
    CodeEntry::new(0x48, "EXT_SECUR_17", "Extended security failure code 17"),
    CodeEntry::new(0x49, "EXT_SECUR_18", "Extended security failure code 18"),
    CodeEntry::new(0x4A, "EXT_SECUR_19", "Extended security failure code 19"),
    CodeEntry::new(0x4B, "EXT_SECUR_20", "Extended security failure code 20"),
    CodeEntry::new(0x4C, "EXT_SECUR_21", "Extended security failure code 21"),
    CodeEntry::new(0x4D, "EXT_SECUR_22", "Extended security failure code 22"),
    CodeEntry::new(0x4E, "EXT_SECUR_23", "Extended security failure code 23"),
    CodeEntry::new(0x4F, "EXT_SECUR_24", "Extended security failure code 24"),
    CodeEntry::new(0x70, "UPLOAD_DOWNLOAD", "Fault when attempting to start upload/download"),
    CodeEntry::new(0x71, "TRX_SUSPENDED", "Transfer aborting due to a fault"),
    CodeEntry::new(0x72, "GEN_PROGRAMMING", "Fault while attempting to write to ECU memory"),
    CodeEntry::new(0x73, "WRONG_BLOCK_SEQ", "Invalid sequence value detected during transfer"),
    CodeEntry::new(0x78, "RESP_PENDING", "Request successful but ECU still busy - Response pending"),
    CodeEntry::new(0x7E, "SUBFUNCT_CURRSESS", "ECU does not support this subfunction in current session type"),
    CodeEntry::new(0x7F, "SERVICE_CURRSESS", "ECU does not support this service in current session type"),
    CodeEntry::new(0x81, "RPM_TOOHIGH", "RPM is too high to execute request"),
    CodeEntry::new(0x82, "RPM_TOOLOW", "RPM is too low to execute request"),
    CodeEntry::new(0x83, "ENGINE_RUNNING", "Cannot execute request while engine is running"),
    CodeEntry::new(0x84, "ENGINE_NOTRUNNING", "Cannot execute request while engine is off"),
    CodeEntry::new(0x85, "ENG_RUNTIME_LOW", "Cannot execute request until engine has run for longer"),
    CodeEntry::new(0x86, "TEMPERATURE_HIGH", "Cannot execute request until temperature is lower"),
    CodeEntry::new(0x87, "TEMPERATURE_LOW", "Cannot execute request until temperature is higher"),
    CodeEntry::new(0x88, "SPEED_HIGH", "Cannot execute request until vehicle slows down"),
    CodeEntry::new(0x89, "SPEED_LOW", "Cannot execute request until vehicle is going faster"),
    CodeEntry::new(0x8A, "PEDAL_HIGH", "Cannot execute request until throttle is lower"),
    CodeEntry::new(0x8B, "PEDAL_LOW", "Cannot execute request until throttle is higher"),
    CodeEntry::new(0x8C, "NOT_NEUTRAL", "Cannot execute request until transmission is in neutral"),
    CodeEntry::new(0x8D, "NOT_INGEAR", "Cannot execute request until vehicle is in gear"),
    CodeEntry::new(0x8F, "BRAKE_NOTPRESSED", "Cannot execute request until brake pedal is pressed (Hold down)"),
    CodeEntry::new(0x90, "NOT_PARK", "Cannot execute request until vehicle is in park"),
    CodeEntry::new(0x91, "CLUTCH_LOCKED", "Cannot execute request while clutch is locked"),
    CodeEntry::new(0x92, "VOLTAGE_HIGH", "Cannot execute request until voltage is lower"),
    CodeEntry::new(0x93, "VOLTAGE_LOW", "Cannot execute request until voltage is higher"),
];

fn find(table: &'static [CodeEntry], code: u8) -> Option<&'static CodeEntry> {
    table.iter().find(|entry| entry.code == code)
}

/// Look up a service id. Positive responses (`service + 0x40`) resolve to
/// their request's entry when there is no exact match.
pub fn service_entry(code: u8) -> Option<&'static CodeEntry> {
    find(SERVICES, code).or_else(|| {
        code.checked_sub(cs_protocol::POSITIVE_RESPONSE_OFFSET)
            .and_then(|request| find(SERVICES, request))
    })
}

pub fn negative_response_entry(code: u8) -> Option<&'static CodeEntry> {
    find(NEGATIVE_RESPONSES, code)
}

pub fn service_name(code: u8) -> Option<&'static str> {
    service_entry(code).map(|e| e.name)
}

pub fn service_description(code: u8) -> Option<&'static str> {
    service_entry(code).map(|e| e.description)
}

pub fn negative_response_name(code: u8) -> Option<&'static str> {
    negative_response_entry(code).map(|e| e.name)
}

pub fn negative_response_description(code: u8) -> Option<&'static str> {
    negative_response_entry(code).map(|e| e.description)
}
