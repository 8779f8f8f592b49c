use std::cell::RefCell;
use std::rc::Rc;

use deno_core::{anyhow::Error as AnyError, op, OpState};
use indexmap::IndexMap;

use faas_models::FaasError;

/// `res`'s state machine (§4.6): `Head` → `Body` → `Terminal`. Header
/// mutation is legal only in `Head`; a body chunk or a terminal op moves it
/// forward and it never moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResState {
    Head,
    Body,
    Terminal,
}

pub struct ResponseState {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
    pub state: ResState,
}

impl ResponseState {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: IndexMap::new(),
            set_cookies: Vec::new(),
            body: Vec::new(),
            state: ResState::Head,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state == ResState::Terminal
    }

    fn require_head(&self) -> Result<(), FaasError> {
        match self.state {
            ResState::Head => Ok(()),
            _ => Err(FaasError::HeadersAlreadySent),
        }
    }

    fn flush_headers(&mut self) {
        if self.state == ResState::Head {
            self.state = ResState::Body;
        }
    }

    pub fn set_status(&mut self, code: u16) -> Result<(), FaasError> {
        self.require_head()?;
        self.status = code;
        Ok(())
    }

    pub fn set_header(&mut self, key: String, value: String) -> Result<(), FaasError> {
        self.require_head()?;
        self.headers.insert(key.to_lowercase(), value);
        Ok(())
    }

    pub fn remove_header(&mut self, key: &str) -> Result<(), FaasError> {
        self.require_head()?;
        self.headers.shift_remove(&key.to_lowercase());
        Ok(())
    }

    pub fn get_header(&self, key: &str) -> Option<String> {
        self.headers.get(&key.to_lowercase()).cloned()
    }

    pub fn set_type(&mut self, mime: String) -> Result<(), FaasError> {
        self.set_header("content-type".to_string(), mime)
    }

    pub fn cookie(&mut self, set_cookie_header: String) -> Result<(), FaasError> {
        self.require_head()?;
        self.set_cookies.push(set_cookie_header);
        Ok(())
    }

    pub fn write(&mut self, chunk: &[u8]) -> Result<(), FaasError> {
        if self.state == ResState::Terminal {
            return Err(FaasError::HeadersAlreadySent);
        }
        self.flush_headers();
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    pub fn json(&mut self, body: &[u8]) -> Result<(), FaasError> {
        self.require_head()?;
        if !self.headers.contains_key("content-type") {
            self.set_header("content-type".to_string(), "application/json".to_string())?;
        }
        self.body.extend_from_slice(body);
        self.state = ResState::Terminal;
        Ok(())
    }

    pub fn send(&mut self, body: &[u8], inferred_content_type: Option<&str>) -> Result<(), FaasError> {
        self.require_head()?;
        if !self.headers.contains_key("content-type") {
            if let Some(mime) = inferred_content_type {
                self.set_header("content-type".to_string(), mime.to_string())?;
            }
        }
        self.body.extend_from_slice(body);
        self.state = ResState::Terminal;
        Ok(())
    }

    pub fn end(&mut self, data: Option<&[u8]>) -> Result<(), FaasError> {
        if self.state == ResState::Terminal {
            return Err(FaasError::HeadersAlreadySent);
        }
        self.flush_headers();
        if let Some(bytes) = data {
            self.body.extend_from_slice(bytes);
        }
        self.state = ResState::Terminal;
        Ok(())
    }

    pub fn redirect(&mut self, status: u16, location: String) -> Result<(), FaasError> {
        self.require_head()?;
        self.status = status;
        self.set_header("location".to_string(), location)?;
        self.state = ResState::Terminal;
        Ok(())
    }
}

impl Default for ResponseState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedResponse = Rc<RefCell<ResponseState>>;

#[op]
pub fn op_res_status(state: &mut OpState, code: u16) -> Result<(), AnyError> {
    Ok(state.borrow::<SharedResponse>().borrow_mut().set_status(code)?)
}

#[op]
pub fn op_res_set_header(state: &mut OpState, key: String, value: String) -> Result<(), AnyError> {
    Ok(state.borrow::<SharedResponse>().borrow_mut().set_header(key, value)?)
}

#[op]
pub fn op_res_get_header(state: &mut OpState, key: String) -> Result<Option<String>, AnyError> {
    Ok(state.borrow::<SharedResponse>().borrow().get_header(&key))
}

#[op]
pub fn op_res_get_headers(state: &mut OpState) -> Result<Vec<(String, String)>, AnyError> {
    let res = state.borrow::<SharedResponse>().borrow();
    Ok(res.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

#[op]
pub fn op_res_remove_header(state: &mut OpState, key: String) -> Result<(), AnyError> {
    Ok(state.borrow::<SharedResponse>().borrow_mut().remove_header(&key)?)
}

#[op]
pub fn op_res_type(state: &mut OpState, mime: String) -> Result<(), AnyError> {
    Ok(state.borrow::<SharedResponse>().borrow_mut().set_type(mime)?)
}

#[op]
pub fn op_res_cookie(state: &mut OpState, set_cookie_header: String) -> Result<(), AnyError> {
    Ok(state.borrow::<SharedResponse>().borrow_mut().cookie(set_cookie_header)?)
}

#[op]
pub fn op_res_write(state: &mut OpState, chunk_base64: String) -> Result<(), AnyError> {
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &chunk_base64)?;
    Ok(state.borrow::<SharedResponse>().borrow_mut().write(&bytes)?)
}

#[op]
pub fn op_res_json(state: &mut OpState, body_base64: String) -> Result<(), AnyError> {
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &body_base64)?;
    Ok(state.borrow::<SharedResponse>().borrow_mut().json(&bytes)?)
}

#[op]
pub fn op_res_send(
    state: &mut OpState,
    body_base64: String,
    inferred_content_type: Option<String>,
) -> Result<(), AnyError> {
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &body_base64)?;
    Ok(state
        .borrow::<SharedResponse>()
        .borrow_mut()
        .send(&bytes, inferred_content_type.as_deref())?)
}

#[op]
pub fn op_res_end(state: &mut OpState, data_base64: Option<String>) -> Result<(), AnyError> {
    let bytes = data_base64
        .map(|b| base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &b))
        .transpose()?;
    Ok(state.borrow::<SharedResponse>().borrow_mut().end(bytes.as_deref())?)
}

#[op]
pub fn op_res_redirect(state: &mut OpState, status: u16, location: String) -> Result<(), AnyError> {
    Ok(state.borrow::<SharedResponse>().borrow_mut().redirect(status, location)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_after_write_is_rejected() {
        let mut res = ResponseState::new();
        res.write(b"hello").unwrap();
        assert!(res.set_header("x".to_string(), "y".to_string()).is_err());
    }

    #[test]
    fn json_transitions_straight_to_terminal() {
        let mut res = ResponseState::new();
        res.json(b"{}").unwrap();
        assert!(res.is_terminal());
        assert_eq!(res.get_header("content-type").unwrap(), "application/json");
    }

    #[test]
    fn end_after_terminal_is_rejected() {
        let mut res = ResponseState::new();
        res.end(None).unwrap();
        assert!(res.end(None).is_err());
    }

    #[test]
    fn redirect_sets_location_and_terminal() {
        let mut res = ResponseState::new();
        res.redirect(302, "/login".to_string()).unwrap();
        assert!(res.is_terminal());
        assert_eq!(res.get_header("location").unwrap(), "/login");
    }
}
