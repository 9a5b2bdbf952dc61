/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Tag numbers the session core reads or writes.
//!
//! Messages carry raw `u32` tags; these constants name the ones correlation
//! and authentication look at.

/// Well-known tag numbers.
pub mod tags {
    /// ClOrdID.
    pub const CL_ORD_ID: u32 = 11;
    /// MsgSeqNum.
    pub const MSG_SEQ_NUM: u32 = 34;
    /// OrigClOrdID.
    pub const ORIG_CL_ORD_ID: u32 = 41;
    /// RefSeqNum.
    pub const REF_SEQ_NUM: u32 = 45;
    /// Text.
    pub const TEXT: u32 = 58;
    /// ListID.
    pub const LIST_ID: u32 = 66;
    /// TestReqID.
    pub const TEST_REQ_ID: u32 = 112;
    /// QuoteID.
    pub const QUOTE_ID: u32 = 117;
    /// QuoteReqID.
    pub const QUOTE_REQ_ID: u32 = 131;
    /// MDReqID.
    pub const MD_REQ_ID: u32 = 262;
    /// SecurityReqID.
    pub const SECURITY_REQ_ID: u32 = 320;
    /// SecurityStatusReqID.
    pub const SECURITY_STATUS_REQ_ID: u32 = 324;
    /// TradSesReqID.
    pub const TRAD_SES_REQ_ID: u32 = 335;
    /// BusinessRejectRefID.
    pub const BUSINESS_REJECT_REF_ID: u32 = 379;
    /// Username.
    pub const USERNAME: u32 = 553;
    /// Password.
    pub const PASSWORD: u32 = 554;
    /// QuoteStatusReqID.
    pub const QUOTE_STATUS_REQ_ID: u32 = 649;
    /// PosReqID.
    pub const POS_REQ_ID: u32 = 710;
    /// OrdStatusReqID.
    pub const ORD_STATUS_REQ_ID: u32 = 790;
    /// CollInquiryID.
    pub const COLL_INQUIRY_ID: u32 = 909;
}
