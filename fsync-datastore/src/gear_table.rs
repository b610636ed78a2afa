//! Fixed pseudo-random 64-bit gear table used by the FastCDC rolling hash.
//! Values are arbitrary but must never change once deployed, since
//! changing them would re-chunk every file on disk.
pub const GEAR: [u64; 256] = [
    0x151c948cbc70b335, 0x1c5d7fd023b9e82a, 0xa6aeaa8a18ebd1d1, 0xac56f1b52be094b9,
    0x79f021266ca2e8d7, 0x6203c7ae1d4ec7d8, 0xd781ee90dcaa68c8, 0x6ea2f91b39dd7833,
    0x8c2ad9797097cc47, 0x0b1ac755130c04a8, 0xccc0a8e5899a3304, 0x582adcecca87a313,
    0x0eddfd37fcfc27cc, 0xdf3678736e426b5a, 0x72fc2e27fe38be18, 0x01d36f8b64bbcec6,
    0xf6ace9b86e26490b, 0xce803504147c00dd, 0x85903569c78048d7, 0x62ccbafb7a63de89,
    0x8489da0bbf6d3349, 0xbc31131c603dd867, 0x684908d5634d9205, 0xd43cbf5a1a116066,
    0x342c52d6900d7d1d, 0x958d74dd65093333, 0xbdddcd7e75f227e7, 0x14a28f856ddd129f,
    0x5bbb54b337c805e1, 0xadb050c20bac1e5d, 0x74e1d129cb17bb1d, 0x3ef44c04c18a8ef3,
    0xac25116f73ca3e62, 0x906906b723f21364, 0x51b136fdbc72d198, 0x7d938576e242605e,
    0xe2dff6ec3f608310, 0xcb5ce0d325b0b2f9, 0x345a4dae96ea3f4e, 0xf8a92cf5d51368cd,
    0x6264d9d2d0d6938f, 0x902dcb3dac0c62c7, 0x6feb9a354aafa335, 0xf2f9caa0ee1b9a64,
    0xcf07eaf5d15ada49, 0xda3acf48dd6be391, 0x3fe3e3d91e87da6e, 0x1660b5bddf8457c2,
    0xbdec5c5ec9ff6f4e, 0x757b48e288a82236, 0x1b3dc0093e0ad3b1, 0x9aa5706b3b3ae064,
    0xca109a6dc89b25d6, 0x7c5a6f5002ba978d, 0x30b0bca84011cf8f, 0xd74e898f4865cfb5,
    0x0184e7df0dea0da3, 0x80b3d944589793b2, 0xd0ee17fef9cb124d, 0x9bfc9c8162156f4d,
    0xa3c9ba7a39fee3ee, 0xb53ea62dcd292fca, 0xdda36c1eb9b41c25, 0x64fcc3703dccf945,
    0x34597732ad8bca0b, 0xec095a070d41170a, 0xa5c9c6015103712d, 0x6b4b70d4e8cafa26,
    0xf83ae90f5cc824f5, 0x71c27de28c3c9977, 0xe44050c003b6afde, 0xb76e1d46b4b44052,
    0x713f5952cce49004, 0xf2fd36fc18019616, 0xe18626db5ed574b1, 0xef37181f105eb14d,
    0xe31ba2afc3be198f, 0xa4a95a3ddf8e41ee, 0xd23d0f26e7d00582, 0x4d03619223af37ff,
    0xfd897b674576fbc9, 0xf4a5d9ce84af6661, 0x8b51450891d5bcc6, 0x31d9ee651bb048c3,
    0x23e2513dc847a59b, 0x3ea16a9dcea764a6, 0xc14bcccbb4d9dcbc, 0xb196e86a32c29a85,
    0x52055c79d096af55, 0x9279afb7975f3352, 0xa84aa06a15171dfd, 0xebeb485e7ec5a7c2,
    0xb8c4e4c24ae1a6ab, 0x4e18dcfc803ef1fe, 0xef87676e2cbbb45b, 0xbe75262f1259cb1b,
    0xc111823a7f54fc0d, 0xa5df39edb2386dc0, 0xf815bbc816c375ee, 0xcaf0c6ee2fdbbd8d,
    0x29bc98a9d0138bc9, 0xacaf2f0e6a63ebee, 0x765294b46828f5ac, 0x39995a3344926fa0,
    0x1ea3db998f5c96ef, 0x257b9a25028fb6bc, 0x3ae5188144c1ef51, 0xdf66bc2cef0399f8,
    0x7a61606bb6a86da7, 0x9d0f1eec6983c39e, 0xe19cb5ee9be8602b, 0x0cd426ef3559a200,
    0xc512594cd870e44f, 0xf43e61a612329174, 0xbf981614e7eddaa4, 0xcff31b0bb000b4d7,
    0x457f71facea18e31, 0x230ecc53a08f5499, 0xaa5b04fdfa0d4f47, 0x07f3dd53663077b0,
    0x72fbecf3a7d2da1b, 0x45f03c33b2c59d9a, 0xa60e240030fe24f7, 0x0eae94728fb29920,
    0x6e1dc51b11479ac7, 0x3e03817d552649e7, 0x2ddcb0d8da836fba, 0x0cf04e883d08a591,
    0x90e40aed82d89db3, 0xaf63582a4685b71c, 0x34efbaa41a3c0b03, 0x19c06bf1f0339bc2,
    0xeef7d512a7bd1e7e, 0x885d4518b6b97df2, 0xea1fd0ffcb6f6b72, 0x419979415e560149,
    0xc3097e5671902b58, 0x1aa1f963577e7809, 0x4b27c1cf3a6730ec, 0xbeadcc6f27eddb18,
    0x56e579fd7e9e15d6, 0xa5b1b746eaec1350, 0xa246509a448df45f, 0xd937d7214f4eeb9c,
    0x3c73a501e5ebd13f, 0xacbde5ee22c92be7, 0x85b393cc09ea0f45, 0x765d408fb8fd457c,
    0x48bb9528b83ea8fb, 0xcafcedbf83498d3f, 0xc05ecfb73bf49392, 0xffa6aa494693c457,
    0xf82f4b1939daa2ed, 0xf0dbe1eede25487a, 0x6eb57f6e5fb78f54, 0x923c56917ec3c7f5,
    0xa27ab08127137aae, 0xcba946573bb4e928, 0xa234509ca6347178, 0x91ecb0fc4c9afd79,
    0x80566e03a6055546, 0x15ffd6d38d99fedd, 0x85504855507d9252, 0x1eecd2ec29213f3c,
    0xaf816c0dc63d0d64, 0x38b03ab50f892f7b, 0x551f9ff6d6b30ed9, 0xf1bae850c1113369,
    0x24e5e5362ba951db, 0x1ef64533372167b4, 0x6ff058dbe32413e6, 0x1882322de22bdc60,
    0xa7674e2bdf91455f, 0x34c850e3857e30da, 0x71b95461c3cd7cdf, 0x4f7bded120d0e431,
    0xca93e63ea20416a3, 0x3aecfd6c8de9697c, 0x1fc5d9c11e5e27cd, 0x282052a971eca78f,
    0x9802fa8b78623032, 0xbbfa81ba4e62d830, 0xe783842137188c25, 0x2bf750689827a47f,
    0x394bfb4fe45da079, 0xafb74a89d69eb20e, 0xb9231e79361f72c4, 0xbe2d4771f9c74722,
    0x1cc493afbc68b9e3, 0x4b4876c49728a384, 0xa787d4f4ad308133, 0x67526e4576fe7215,
    0x42a74036b00c7e62, 0x10d4e842649d27a5, 0x21a3398834ea6efc, 0xa868c266af9ba532,
    0x042948ee7b74d2d3, 0x85e987ec98607398, 0xde63613599a01139, 0x54fe265e20143e14,
    0x2609d4192d21aaba, 0x4a0a72f624b58763, 0xe884fae0a4aae7d7, 0xbd994485e69f8134,
    0x0a60bcbf7391988c, 0x3f0d6269f68acc47, 0x1692a116622d92cf, 0x16ede0738f688564,
    0xdb25b2d946cae28a, 0xfc0b0155d2e2f80f, 0x35cdd479c92b2ce0, 0x2d1d02fddda94e78,
    0x26500c988ce9f0cd, 0xab94e866ae754e63, 0x2697f841b5480f43, 0xad45171749325041,
    0xfcfe22baf861a513, 0xab2c264597f692fd, 0x6ceae1b4dc58744c, 0xaf7ae2203b2446f6,
    0xe347dfc2a9fa4f98, 0x109c006fdc10da7c, 0x946686ffbeacc54f, 0x75170c1c54971dd4,
    0x644adfb1b26ebc7d, 0xf161820683c5c0b0, 0x40905bd633bff477, 0x5a450eb88dd4947f,
    0xb8d31132c9eb22ab, 0x1f058f18f8ca92a0, 0xec45c4b7691342f5, 0xf5d4933d413d2194,
    0x85c616bcc4e2e8cb, 0x999f16f0af53960a, 0x1160589653480486, 0x9b63e302a022d9e3,
    0xc5f6671366fab986, 0x063e247da08cfad9, 0x73a79117ae023d95, 0x59891231f7e11700,
    0x415590b13cd492c2, 0x9ea39fe8b983d0fd, 0x410ef03bb5943c23, 0xcdf31e00187f2c4f,
    0x88efa8176eecc39f, 0x2c454a19392ca4c9, 0x251737580f34f593, 0x3d4cf1d615150074,
    0xb9bfba4d29ae53ac, 0xafa93d5d725edb5d, 0xd0b95b9756e03df1, 0x61a3f9a6edd60a6b,
    0x4c5c362f31a57a3f, 0x5c336a68a8f35049, 0x188a417a07f49cab, 0x683d523fc7c76795,
];
